use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Installs the JSON log formatter, filtered by `RUST_LOG`.
///
/// Fails if the host already installed a global subscriber.
pub fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
