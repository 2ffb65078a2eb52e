use std::error::Error;
use std::io;

use tracing::{Level, debug};
use tracing_subscriber::fmt::format::FmtSpan;

mod cli;
mod command;
mod config;
mod control_plane;
mod prompt;
mod universe;

use config::ConfigFile;
use control_plane::DryRun;
use prompt::Terminal;
use universe::upgrade::{self, Route};

fn verbosity_to_log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn initialize_tracing(verbosity: u8) {
    tracing_subscriber::fmt::fmt()
        .with_span_events(FmtSpan::NONE)
        .with_target(false)
        .with_max_level(verbosity_to_log_level(verbosity))
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let invocation = cli::resolve(std::env::args_os()).unwrap_or_else(|e| e.exit());

    initialize_tracing(invocation.verbose);
    debug!(?invocation);
    match invocation.route {
        Route::Help(help) => print!("{help}"),
        Route::Dispatch(child, flags) => {
            let conf = ConfigFile::load(invocation.config.as_deref())?;
            let mut plane = DryRun::new(&conf, io::stdout().lock());
            let mut terminal = Terminal::new(io::stdin().lock(), io::stderr());
            upgrade::run(&child, &flags, &mut plane, &mut terminal)?;
        }
    }
    Ok(())
}
