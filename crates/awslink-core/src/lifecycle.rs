//! Object-safe lifecycle interface for driving connections of any service.

use async_trait::async_trait;
use tracing::info;

use crate::error::ConnectionResult;

/// The lifecycle transitions a host drives on a connection.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Build resources.
    async fn init(&self) -> ConnectionResult<()>;

    /// Begin serving.
    async fn start(&self) -> ConnectionResult<()>;

    /// Release resources. Never fails.
    async fn stop(&self);

    /// Final teardown. Never fails.
    async fn close(&self);
}

/// Initialize and start `component`.
///
/// # Errors
/// Returns the first failing transition's error.
pub async fn init_and_start(component: &dyn Lifecycle) -> ConnectionResult<()> {
    component.init().await?;
    component.start().await?;
    info!(component = component.name(), "component ready");
    Ok(())
}

/// Stop and close `component`.
pub async fn stop_and_close(component: &dyn Lifecycle) {
    component.stop().await;
    component.close().await;
}

/// Initialize and start every component in order.
///
/// If one fails, it and every component before it are stopped and closed in
/// reverse order before the error is returned. Components after the failing
/// one are left untouched.
///
/// # Errors
/// Returns the failing component's error.
pub async fn init_and_start_all(components: &[&dyn Lifecycle]) -> ConnectionResult<()> {
    for (index, component) in components.iter().enumerate() {
        if let Err(e) = init_and_start(*component).await {
            for started in components[..=index].iter().rev() {
                stop_and_close(*started).await;
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Stop and close every component in reverse order.
pub async fn stop_and_close_all(components: &[&dyn Lifecycle]) {
    for component in components.iter().rev() {
        stop_and_close(*component).await;
    }
}
