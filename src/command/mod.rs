//! Reconstruction commands.
//!
//! Builders are pure: they turn a value read from the store into the
//! command that recreates it. Nothing here touches the network. Keys and
//! values are kept as raw bytes, so binary data survives a dump.

use std::fmt;

use bytes::Bytes;

use crate::store::DbIndex;

/// An ordered, non-empty list of arguments; the first one is the command
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(Vec<Bytes>);

impl Command {
    /// Builds `name arg1 arg2 ...`.
    pub fn new<I, S>(
        name: &'static str,
        args: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Bytes>,
    {
        let args = args.into_iter();
        let mut parts = Vec::with_capacity(1 + args.size_hint().0);
        parts.push(Bytes::from_static(name.as_bytes()));
        parts.extend(args.map(Into::into));
        Self(parts)
    }

    pub fn name(&self) -> &[u8] {
        &self.0[0]
    }

    pub fn args(&self) -> &[Bytes] {
        &self.0[1..]
    }

    /// Name and arguments together.
    pub fn parts(&self) -> &[Bytes] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a command carries at least its name.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn into_parts(self) -> Vec<Bytes> {
        self.0
    }
}

/// Space separated; bytes that are not UTF-8 show as U+FFFD.
impl fmt::Display for Command {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&String::from_utf8_lossy(part))?;
        }
        Ok(())
    }
}

/// `SET key value`
pub fn set(
    key: impl AsRef<[u8]>,
    value: impl Into<Bytes>,
) -> Command {
    Command::new("SET", [key_bytes(key), value.into()])
}

/// `RPUSH key item...`, items in list order.
pub fn rpush<I, S>(
    key: impl AsRef<[u8]>,
    items: I,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<Bytes>,
{
    Command::new("RPUSH", with_key(key, items))
}

/// `SADD key member...`
pub fn sadd<I, S>(
    key: impl AsRef<[u8]>,
    members: I,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<Bytes>,
{
    Command::new("SADD", with_key(key, members))
}

/// `HSET key field value ...`, each field directly followed by its value.
pub fn hset<I, F, V>(
    key: impl AsRef<[u8]>,
    pairs: I,
) -> Command
where
    I: IntoIterator<Item = (F, V)>,
    F: Into<Bytes>,
    V: Into<Bytes>,
{
    let flat = pairs
        .into_iter()
        .flat_map(|(field, value)| [field.into(), value.into()]);
    Command::new("HSET", with_key(key, flat))
}

/// `ZADD key score member ...` from a flat `[member, score, ...]` reply.
///
/// A trailing member without a score is dropped.
pub fn zadd<I, S>(
    key: impl AsRef<[u8]>,
    members_with_scores: I,
) -> Command
where
    I: IntoIterator<Item = S>,
    S: Into<Bytes>,
{
    let mut flat = members_with_scores.into_iter().map(Into::into);
    let mut pairs = Vec::new();
    while let (Some(member), Some(score)) = (flat.next(), flat.next()) {
        pairs.push(score);
        pairs.push(member);
    }
    Command::new("ZADD", with_key(key, pairs))
}

/// `EXPIREAT key unix_seconds`
pub fn expire_at(
    key: impl AsRef<[u8]>,
    unix_seconds: i64,
) -> Command {
    Command::new(
        "EXPIREAT",
        [key_bytes(key), Bytes::from(unix_seconds.to_string())],
    )
}

/// `SELECT db`
pub fn select(db: DbIndex) -> Command {
    Command::new("SELECT", [Bytes::from(db.to_string())])
}

fn key_bytes(key: impl AsRef<[u8]>) -> Bytes {
    Bytes::copy_from_slice(key.as_ref())
}

fn with_key<I, S>(
    key: impl AsRef<[u8]>,
    rest: I,
) -> impl Iterator<Item = Bytes>
where
    I: IntoIterator<Item = S>,
    S: Into<Bytes>,
{
    std::iter::once(key_bytes(key)).chain(rest.into_iter().map(Into::into))
}
