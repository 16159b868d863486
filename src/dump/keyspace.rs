//! Database discovery from the `INFO keyspace` report.

use dump_error::{DumpError, DumpResult};

use crate::store::DbIndex;

/// Highest database index accepted by default.
pub const DEFAULT_MAX_DB_INDEX: u32 = 16;

/// Extracts the indices of the non-empty databases.
///
/// Only lines starting with `db` are considered (`db3:keys=1,expires=0`);
/// the index is the text between `db` and the first `:`. An index greater
/// than `max_db_index` is rejected; `max_db_index` itself is accepted.
pub fn parse_keyspace_info(
    info: &str,
    max_db_index: u32,
) -> DumpResult<Vec<DbIndex>> {
    let mut dbs = Vec::new();

    for line in info.lines().map(str::trim) {
        let Some(rest) = line.strip_prefix("db") else {
            continue;
        };

        let invalid = || DumpError::InvalidDbIndex {
            line: line.to_string(),
        };
        let (index, _) = rest.split_once(':').ok_or_else(invalid)?;
        let index: u64 = index.parse().map_err(|_| invalid())?;

        if index > u64::from(max_db_index) {
            return Err(DumpError::DbIndexOutOfRange {
                index,
                max: max_db_index,
            }
            .into());
        }

        // Lossless: bounded by `max_db_index`.
        dbs.push(index as DbIndex);
    }

    Ok(dbs)
}
