use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;
use tracing::Instrument;

use crate::Result;

/// Spawns `task_fn` on `runtime` inside the caller's span, logging its
/// failure under `name`.
pub(crate) fn spawn_task<F, Fut>(
    runtime: &Handle,
    name: &str,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    runtime.spawn(async move {
        match task_fn().await {
            Ok(()) => debug!("spawned task: {name} finished"),
            Err(e) => error!("spawned task: {name} stopped or encountered an error: {:?}", e),
        }
    }
    .in_current_span())
}
