use std::process::ExitCode;
use std::time::Instant;

use pgsale::{ArgMap, Error, Invocation, cli};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let start = Instant::now();
    let args = ArgMap::decode(
        std::env::args_os()
            .skip(1)
            .map(|arg| arg.to_string_lossy().into_owned()),
    );
    init_tracing(cli::debug_enabled(args.scalar("debug")));

    let code = match Invocation::from_args(args).and_then(|invocation| pgsale::run(&invocation)) {
        Ok(outcome) => {
            tracing::debug!(client_id = %outcome.client.get_or_null("id"), "Done");
            ExitCode::SUCCESS
        }
        // Bad invocations are reported, not signalled.
        Err(Error::Validation(e)) => {
            println!("ERROR: {e}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    };

    tracing::debug!(elapsed = ?start.elapsed(), "Finished");
    code
}

/// `RUST_LOG` wins; otherwise `debug=N>0` selects debug output.
fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}
