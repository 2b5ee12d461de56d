//! Blocking-work helper. rusqlite calls are synchronous; every DB phase in
//! the async services runs through here so the runtime threads never block
//! on the connection mutex.

use crate::error::{Error, Result};

pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(anyhow::anyhow!("blocking task panicked: {e}")))?
}
