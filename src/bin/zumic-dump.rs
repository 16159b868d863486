//! zumic-dump
//!
//! Dumps a RESP key-value server (all non-empty databases, or a single one)
//! to stdout or a file, as RESP requests or plain command lines.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};
use zumic_dump::{
    logging::{self, LogFormat, LoggingConfig},
    ConsoleSink, DumpSettings, Dumper, FileSink, ProgressNotification, RespConnector, Serializer,
    SharedSink,
};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_COMMIT"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

/// Command line arguments.
///
/// Every option left unset keeps the value from the config file, the
/// `ZUMIC_DUMP_*` environment or the built-in default, in that order.
#[derive(Parser, Debug)]
#[command(name = "zumic-dump")]
#[command(version = VERSION)]
#[command(about = "Dump a RESP key-value server as a replayable command stream", long_about = None)]
struct Cli {
    /// Server host (default 127.0.0.1)
    #[arg(short = 'H', long, env = "ZUMIC_DUMP_HOST")]
    host: Option<String>,
    /// Server port (default 6379)
    #[arg(short, long)]
    port: Option<u16>,
    /// Dump only this database
    #[arg(long)]
    db: Option<u32>,
    /// Concurrent workers (default 10)
    #[arg(short = 'n', long)]
    workers: Option<usize>,
    /// Keys per batch (default 100)
    #[arg(long)]
    batch_size: Option<usize>,
    /// Output format (default resp)
    #[arg(long, value_enum)]
    output: Option<Serializer>,
    /// Do not dump expirations
    #[arg(long)]
    no_ttl: bool,
    /// Only dump keys matching this glob (default *)
    #[arg(long)]
    filter: Option<String>,
    /// ACL user name
    #[arg(long)]
    user: Option<String>,
    /// Password
    #[arg(short = 'a', long, env = "ZUMIC_DUMP_PASSWORD", hide_env_values = true)]
    auth: Option<String>,
    /// Connect timeout in seconds (default 5)
    #[arg(long)]
    timeout: Option<u64>,
    /// Reply timeout in seconds (default 30)
    #[arg(long)]
    read_timeout: Option<u64>,
    /// Request timeout in seconds (default 10)
    #[arg(long)]
    write_timeout: Option<u64>,
    /// Highest database index to accept from the server (default 16)
    #[arg(long)]
    max_db_index: Option<u32>,
    /// No progress on stderr
    #[arg(short, long)]
    silent: bool,
    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
    /// Errors only
    #[arg(short, long)]
    quiet: bool,
    /// Log line format (default compact)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the dump to this file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl Cli {
    /// Loads the layered settings and applies the flags on top.
    fn settings(&self) -> Result<DumpSettings> {
        let mut settings = DumpSettings::load(self.config.as_deref())?;

        macro_rules! apply {
            ($($flag:ident => $field:ident),* $(,)?) => {
                $(if let Some(v) = &self.$flag {
                    settings.$field = v.clone().into();
                })*
            };
        }
        apply!(
            host => host,
            port => port,
            workers => workers,
            batch_size => batch_size,
            output => output,
            filter => filter,
            user => username,
            auth => password,
            timeout => connect_timeout_secs,
            read_timeout => read_timeout_secs,
            write_timeout => write_timeout_secs,
            max_db_index => max_db_index,
            log_format => log_format,
            db => db,
        );

        if self.no_ttl {
            settings.with_ttl = false;
        }
        if self.silent {
            settings.silent = true;
        }
        if self.verbose || self.quiet {
            settings.log_level = logging::level_for(self.verbose, self.quiet).to_string();
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match cli.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };

    let logging_config = LoggingConfig {
        // Log colours only make sense when stderr is not redirected.
        with_ansi: std::io::IsTerminal::is_terminal(&std::io::stderr()),
        ..settings.logging_config()
    };
    logging::init_logging(&logging_config)?;
    debug!(?settings, "settings loaded");

    if let Err(e) = run(&settings, cli.out.as_deref()).await {
        error!("dump failed: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    settings: &DumpSettings,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let sink: SharedSink = match out {
        Some(path) => Arc::new(
            FileSink::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Arc::new(ConsoleSink::stdout()),
    };

    let (progress, printer) = if settings.silent {
        (None, None)
    } else {
        let (tx, rx) = mpsc::channel(16);
        (Some(tx), Some(spawn_progress_printer(rx)))
    };

    let dumper = Dumper::new(
        RespConnector::new(settings.address(), settings.client_config()),
        Arc::clone(&sink),
    )
    .with_options(settings.dump_options())
    .with_serializer(settings.output);

    let result = match settings.db {
        Some(db) => dumper.dump_db(db, progress.as_ref()).await,
        None => dumper.dump_server(progress.as_ref()).await,
    };

    drop(progress);
    if let Some(printer) = printer {
        printer.await.context("progress printer failed")?;
    }
    sink.flush();

    Ok(result?)
}

/// Prints `\rDumped <done>/<total> keys` on stderr, one line per database.
fn spawn_progress_printer(mut rx: mpsc::Receiver<ProgressNotification>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut line_open = false;
        while let Some(ProgressNotification { done, total }) = rx.recv().await {
            eprint!("\rDumped {done}/{total} keys");
            line_open = done < total;
            if !line_open {
                eprintln!();
            }
        }
        if line_open {
            eprintln!();
        }
    })
}
