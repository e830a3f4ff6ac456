//! Logging initialization
//!
//! `--verbose` lifts the level to debug; `RUST_LOG` overrides everything.
//! Diagnostics go to stderr so command output stays pipeable.

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool, json_output: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "cursorbar=debug" } else { "cursorbar=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json_output {
        builder.json().try_init().map_err(|e| anyhow::anyhow!(e))?;
    } else {
        builder.try_init().map_err(|e| anyhow::anyhow!(e))?;
    }
    Ok(())
}
