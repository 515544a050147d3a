//! Long-running GC scheduler command.

use crate::models::ObjectType;
use crate::services::ServiceContainer;
use crate::{Error, Result};
use tracing::info;

/// Starts the scheduler and runs until Ctrl-C.
///
/// Must be awaited inside a multi-threaded tokio runtime.
///
/// # Errors
///
/// Returns an error if the interrupt signal cannot be installed.
pub async fn execute(container: &ServiceContainer, types: &[ObjectType]) -> Result<()> {
    let mut scheduler = container.gc_scheduler();
    scheduler.start(types);
    info!(node_id = %container.config().node_id, "Waiting for Ctrl-C");

    let signal = tokio::signal::ctrl_c().await;
    info!("Shutting down GC scheduler");
    scheduler.shutdown().await;

    signal.map_err(|e| Error::OperationFailed {
        operation: "wait_for_signal".to_string(),
        cause: e.to_string(),
    })
}
