// SPDX-License-Identifier: MIT
//
// kilo: the editor binary.
//
// Wires the two crates together:
//
//   kilo-term   → terminal session, key decoding, frame output
//   kilo-editor → view state, screen composition, driving loop
//
// Startup and teardown:
//
//   parse CLI → logging (file only) → open terminal → raw mode
//   → query size → editor loop → clear screen → restore → exit code
//
// The terminal is restored when `Terminal` drops at the end of `run`,
// before `main` prints anything, so error messages always land on a
// cooked terminal. Logs never go to stderr while the screen is raw.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use kilo_editor::{Editor, Options, Screen};
use kilo_term::terminal::{RawModeConfig, Terminal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a log filter, e.g. `KILO_LOG=kilo_term=trace`.
const LOG_ENV: &str = "KILO_LOG";

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "kilo")]
#[command(version)]
#[command(about = "A small terminal editor", long_about = None)]
struct Cli {
    /// How long one read waits for a key, in milliseconds (rounded up to tenths of a second)
    #[arg(long, value_name = "MS", default_value_t = 100)]
    read_timeout_ms: u64,

    /// Don't show the welcome banner
    #[arg(long)]
    no_banner: bool,

    /// Write logs to this file (logging is off otherwise)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log level used when KILO_LOG is not set
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error", "off"]
    )]
    log_level: String,
}

impl Cli {
    fn raw_mode(&self) -> RawModeConfig {
        RawModeConfig::from_millis(self.read_timeout_ms)
    }

    fn options(&self) -> Options {
        Options {
            show_banner: !self.no_banner,
            ..Options::default()
        }
    }
}

/// Send logs to `path`. `KILO_LOG` wins over `level`.
fn init_logging(path: &Path, level: &str) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(io::Error::other)
}

/// One editing session, start to finish.
///
/// On error the screen is cleared on a best-effort basis. Either way the
/// terminal mode is restored when `term` drops on return.
fn run(cli: &Cli) -> kilo_term::Result<()> {
    let mut term = Terminal::open()?;
    term.enter_raw_mode(cli.raw_mode())?;

    let result = session(&mut term, cli.options());
    if result.is_err() {
        let _ = Screen::clear(&mut term);
    }
    result
}

fn session(term: &mut Terminal, options: Options) -> kilo_term::Result<()> {
    let size = term.query_viewport_size()?;
    Editor::new(size, options).run(term)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        if let Err(e) = init_logging(path, &cli.log_level) {
            eprintln!("kilo: cannot log to {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "kilo starting");
    match run(&cli) {
        Ok(()) => {
            info!("kilo exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("kilo: {e}");
            ExitCode::FAILURE
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
