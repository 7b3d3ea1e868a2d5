use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a verbosity level. `RUST_LOG` overrides it.
pub fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "pyprune=error";
    }
    match verbose {
        0 => "pyprune=warn",
        1 => "pyprune=info",
        _ => "pyprune=debug",
    }
}

/// Logs to stderr so stdout carries only command output.
pub fn init_cli_logger(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .without_time()
                .compact(),
        )
        .init();
}
