use std::sync::Arc;

use application::{PresenceTracker, TaskQueue};
use domain::{MessageRepository, NotificationRepository};
use infrastructure::{ConnectionRegistry, GatewayConfig};

use crate::auth::AuthGate;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub presence: Arc<PresenceTracker>,
    pub messages: Arc<dyn MessageRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub auth_gate: Arc<AuthGate>,
    pub tasks: Arc<TaskQueue>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceTracker>,
        messages: Arc<dyn MessageRepository>,
        notifications: Arc<dyn NotificationRepository>,
        auth_gate: Arc<AuthGate>,
        tasks: Arc<TaskQueue>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            registry,
            presence,
            messages,
            notifications,
            auth_gate,
            tasks,
            config,
        }
    }
}
