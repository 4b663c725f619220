//! Backend module for the managed data service
//!
//! This module handles all backend communication in a separate thread to
//! keep the UI responsive. It uses crossbeam channels for thread-safe
//! communication with the frontend.
//!
//! # Architecture
//!
//! The backend runs in a separate thread from the UI, communicating via channels:
//!
//! - [`BackendCommand`] - Messages sent from UI to backend (fetch, create, subscribe, etc.)
//! - [`BackendMessage`] - Messages sent from backend to UI (catalog, readings, status)
//! - [`FrontendReceiver`] - UI-side handle for sending commands and receiving messages
//! - [`DashBackend`] - Main backend entry point that runs the worker
//!
//! # Components
//!
//! - [`BackendClient`] - Facade over tables, change feed and identity service
//! - [`RestBackend`] - HTTP implementation for a hosted backend
//! - [`MockBackend`] - In-memory implementation for tests and the demo mode
//! - [`BackendWorker`] - Worker loop owning the async runtime
//!
//! # Example
//!
//! ```ignore
//! use station_monitor::backend::{BackendMessage, DashBackend, MockBackend};
//! use std::sync::Arc;
//!
//! let client = Arc::new(MockBackend::seeded_demo()?);
//! let (backend, frontend) = DashBackend::new(client);
//!
//! // Spawn backend thread
//! std::thread::spawn(move || backend.run());
//!
//! // Send commands from UI
//! frontend.load_session();
//! frontend.refresh_catalog();
//!
//! // Receive messages
//! for msg in frontend.drain() {
//!     if let BackendMessage::Catalog(snapshot) = msg {
//!         // Redraw with the new snapshot
//!     }
//! }
//! ```

pub mod client;
pub mod mock;
pub mod query;
pub mod realtime;
pub mod rest;
pub mod session;
pub mod worker;

pub use client::{BackendClient, FeedEvent, Subscription};
pub use mock::{MockBackend, MockDataPattern, MockSensorConfig};
pub use query::{Direction, Query};
pub use rest::RestBackend;
pub use session::{AuthEvent, Session, SessionManager, SessionUser};
pub use worker::BackendWorker;

use crate::aggregator::TimeWindow;
use crate::catalog::CatalogSnapshot;
use crate::forms::{NewEntity, NewUser};
use crate::history::HistoryWindow;
use crate::types::{BackendStats, FeedStatus, Reading, Role, Table, User};
use crossbeam_channel::{bounded, Receiver, Sender};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Message sent from the UI to the backend
#[derive(Debug, Clone)]
pub enum BackendCommand {
    /// Ask the identity service for the current session
    LoadSession,
    /// Sign in with email and password
    SignIn { email: String, password: String },
    /// Sign out and forget the session
    SignOut,
    /// Refetch every catalog table
    RefreshCatalog,
    /// Load the most recent readings for the overview cards
    FetchRecentReadings { limit: usize },
    /// Load the readings of the selected sensors over a window
    FetchReadings {
        sensors: Vec<String>,
        window: TimeWindow,
    },
    /// Load the history of one sensor for the history modal
    FetchHistory {
        sensor_id: String,
        window: HistoryWindow,
    },
    /// Open (or replace) the insert subscription of a view
    Subscribe { channel: String },
    /// Tear down the insert subscription of a view
    Unsubscribe { channel: String },
    /// Insert a validated catalog entity
    Create(NewEntity),
    /// Load the user list
    FetchUsers,
    /// Create an identity and its profile row
    CreateUser(NewUser),
    /// Change the role of a user
    UpdateRole { user_id: String, role: Role },
    /// Request current statistics
    RequestStats,
    /// Shutdown the backend
    Shutdown,
}

/// Message sent from the backend to the UI
#[derive(Debug, Clone)]
pub enum BackendMessage {
    /// The worker is up; carries the backend name
    Ready { backend: String },
    /// Current identity, `None` when signed out
    Session(Option<SessionUser>),
    /// Sign-in (or session restore) failed
    AuthError(String),
    /// A new catalog snapshot
    Catalog(Arc<CatalogSnapshot>),
    /// Most recent readings, newest first
    RecentReadings(Vec<Reading>),
    /// Range query result per selected sensor
    Readings {
        per_sensor: HashMap<String, Vec<Reading>>,
    },
    /// A range query failed; previous readings stay
    ReadingsFailed(String),
    /// History of one sensor
    History {
        sensor_id: String,
        window: HistoryWindow,
        readings: Vec<Reading>,
    },
    /// A history query failed
    HistoryFailed { sensor_id: String },
    /// Subscription state of a view channel changed
    FeedStatus { channel: String, status: FeedStatus },
    /// A reading was inserted
    ReadingInserted { channel: String, reading: Reading },
    /// A catalog entity was created
    Created { table: Table },
    /// The user list
    Users(Vec<User>),
    /// A user was created
    UserCreated { email: String },
    /// User creation failed; shown on the form
    UserCreateFailed(String),
    /// A role change was stored
    RoleUpdated { user_id: String, role: Role },
    /// Statistics update
    Stats(BackendStats),
    /// Backend is shutting down
    Shutdown,
}

/// Frontend receiver for backend messages
pub struct FrontendReceiver {
    /// Receiver for backend messages
    pub receiver: Receiver<BackendMessage>,
    /// Sender for commands to the backend
    pub command_sender: Sender<BackendCommand>,
}

impl FrontendReceiver {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<BackendMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<BackendMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.receiver.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// Send a command to the backend
    pub fn send_command(&self, cmd: BackendCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn load_session(&self) {
        let _ = self.command_sender.send(BackendCommand::LoadSession);
    }

    pub fn sign_in(&self, email: String, password: String) {
        let _ = self
            .command_sender
            .send(BackendCommand::SignIn { email, password });
    }

    pub fn sign_out(&self) {
        let _ = self.command_sender.send(BackendCommand::SignOut);
    }

    pub fn refresh_catalog(&self) {
        let _ = self.command_sender.send(BackendCommand::RefreshCatalog);
    }

    pub fn subscribe(&self, channel: &str) {
        let _ = self.command_sender.send(BackendCommand::Subscribe {
            channel: channel.to_string(),
        });
    }

    pub fn unsubscribe(&self, channel: &str) {
        let _ = self.command_sender.send(BackendCommand::Unsubscribe {
            channel: channel.to_string(),
        });
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_sender.send(BackendCommand::Shutdown);
    }
}

/// The backend that runs in a separate thread
pub struct DashBackend {
    /// Client used for every backend call
    client: Arc<dyn BackendClient>,
    /// Receiver for commands from the UI
    command_receiver: Receiver<BackendCommand>,
    /// Sender for messages to the UI
    message_sender: Sender<BackendMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Extra tasks started with the worker's runtime
    background: Vec<BoxFuture<'static, ()>>,
}

impl DashBackend {
    /// Create a new backend with communication channels
    pub fn new(client: Arc<dyn BackendClient>) -> (Self, FrontendReceiver) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded so a stalled UI cannot grow memory without limit
        let (msg_tx, msg_rx) = bounded(10_000);

        let backend = Self {
            client,
            command_receiver: cmd_rx,
            message_sender: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
            background: Vec::new(),
        };

        let frontend = FrontendReceiver {
            receiver: msg_rx,
            command_sender: cmd_tx,
        };

        (backend, frontend)
    }

    /// Run `task` on the worker's runtime until shutdown
    pub fn with_background_task(mut self, task: BoxFuture<'static, ()>) -> Self {
        self.background.push(task);
        self
    }

    /// Run the backend loop
    pub fn run(self) {
        match BackendWorker::new(
            self.client,
            self.command_receiver,
            self.message_sender.clone(),
            self.running,
        ) {
            Ok(mut worker) => {
                for task in self.background {
                    worker.spawn_background(task);
                }
                worker.run();
            }
            Err(e) => {
                tracing::error!("Failed to start backend worker: {}", e);
                let _ = self.message_sender.send(BackendMessage::Shutdown);
            }
        }
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_backend_creation() {
        let (backend, frontend) = DashBackend::new(Arc::new(MockBackend::new()));

        // Backend should be running
        assert!(backend.running.load(Ordering::SeqCst));

        // Should be able to send commands
        assert!(frontend.send_command(BackendCommand::Shutdown));
    }

    #[test]
    fn test_frontend_receiver_commands() {
        let (backend, frontend) = DashBackend::new(Arc::new(MockBackend::new()));

        frontend.load_session();
        frontend.refresh_catalog();
        frontend.subscribe("overview");
        frontend.unsubscribe("overview");
        frontend.shutdown();

        let queued: Vec<_> = backend.command_receiver.try_iter().collect();
        assert_eq!(queued.len(), 5);
        assert!(matches!(queued[2], BackendCommand::Subscribe { ref channel } if channel == "overview"));
    }

    #[test]
    fn test_drain_empty() {
        let (_backend, frontend) = DashBackend::new(Arc::new(MockBackend::new()));
        assert!(frontend.drain().is_empty());
        assert!(frontend.try_recv().is_none());
    }
}
