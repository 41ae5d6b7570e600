//! Tracing setup for the binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks between
/// `nspec=debug,info` and `nspec=info,warn`. Calling this twice is harmless:
/// the second call reports an error that callers may ignore.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(verbose)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .with_thread_ids(false)
                .with_line_number(false)
                .with_file(false)
                .compact(),
        )
        .try_init()?;
    Ok(())
}

fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "nspec=debug,info"
    } else {
        "nspec=info,warn"
    }
}
