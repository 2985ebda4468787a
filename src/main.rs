use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use seaflow_transfer::{Cli, NullSink, Sinks, Transfer, TransferError};

fn init_logger(cli: &Cli) {
    // RUST_LOG wins over --quiet/--verbose when set.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn sinks(cli: &Cli) -> Sinks {
    let mut sinks = Sinks::tracing();
    if !cli.verbose || cli.quiet {
        sinks.debug = Arc::new(NullSink);
    }
    if cli.quiet {
        sinks.info = Arc::new(NullSink);
    }
    sinks
}

fn run(cli: &Cli) -> Result<(), TransferError> {
    let (src, dst) = cli.endpoints();
    let src_fs = src.connect()?;
    let dst_fs = dst.connect()?;

    let mut transfer = Transfer::new(src_fs, src.root(), dst_fs, dst.root())
        .with_earliest(cli.start)
        .with_sinks(sinks(cli));

    let result = transfer
        .copy_log_files()
        .and_then(|()| transfer.copy_capture_files());
    let closed = transfer.close();
    result?;
    closed?;

    if !cli.quiet {
        tracing::info!("{}", transfer.stats());
    }
    Ok(())
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();
    init_logger(&cli);

    if cli.needs_password_prompt() {
        match rpassword::prompt_password("enter SSH password: ") {
            Ok(password) => cli.ssh_password = Some(password),
            Err(e) => {
                eprintln!("could not read SSH password: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
