//! Server state

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::deploy::DeploymentService;
use crate::events::EventBus;

/// Server state shared across handlers
pub struct ServerState {
    pub service: Arc<DeploymentService>,
    pub bus: EventBus,

    /// Cancelled when the server shuts down, ending open event streams
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(service: Arc<DeploymentService>, bus: EventBus, shutdown: CancellationToken) -> Self {
        Self {
            service,
            bus,
            shutdown,
        }
    }
}
