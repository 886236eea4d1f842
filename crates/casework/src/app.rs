//! Application root: builds every component once and hands out shared
//! handles.

use std::sync::Arc;

use casework_protocol::AgentProtocol;
use casework_settings::CaseworkSettings;
use casework_tasks::TaskManager;
use casework_transport::Transport;

/// The wired-up components.
pub struct App {
    /// Effective settings.
    pub settings: CaseworkSettings,
    /// Message protocol over the configured transport.
    pub protocol: Arc<AgentProtocol>,
    /// Task queues.
    pub tasks: Arc<TaskManager>,
}

impl App {
    /// Wire the transport selected by `settings.transport.mock`.
    pub fn new(settings: CaseworkSettings) -> Self {
        let transport = casework_transport::from_settings(&settings.transport);
        Self::with_transport(settings, transport)
    }

    /// Wire the given transport.
    pub fn with_transport(settings: CaseworkSettings, transport: Arc<dyn Transport>) -> Self {
        let protocol = AgentProtocol::new(transport, settings.protocol.clone());
        let tasks = Arc::new(TaskManager::new(settings.queues.clone()));
        Self {
            settings,
            protocol,
            tasks,
        }
    }
}
