//! BackendClient trait for the managed backend
//!
//! This module provides the single facade through which the application
//! talks to the Backend-as-a-Service: table reads and writes, the insert
//! change feed, and the identity service. Both the HTTP implementation
//! ([`RestBackend`](super::rest::RestBackend)) and the in-memory one
//! ([`MockBackend`](super::mock::MockBackend)) implement it.

use super::query::Query;
use super::session::{AuthEvent, NewIdentity, Session};
use crate::error::Result;
use crate::types::{parse_rows, FeedStatus, Record, Table};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// An event delivered by a change subscription
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The subscription changed state (joined, failed, closed)
    Status(FeedStatus),
    /// A row was inserted into the watched table
    Inserted { table: String, record: Value },
}

/// A cancellable stream of change events for one logical channel.
///
/// Events are yielded in the order the backend emits them. Nothing is
/// buffered beyond the channel itself, reordered or deduplicated.
/// Dropping the subscription cancels it.
pub struct Subscription {
    channel: String,
    events: mpsc::UnboundedReceiver<FeedEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(
        channel: impl Into<String>,
        events: mpsc::UnboundedReceiver<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            cancel,
        }
    }

    /// Name of the logical channel
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next event; `None` once cancelled or closed
    pub async fn next(&mut self) -> Option<FeedEvent> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.events.recv() => event,
        }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Unified interface to the managed backend
///
/// Implementations must be `Send + Sync` so the worker can share one
/// client between concurrently running request tasks.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Run a read query and return the raw rows
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Insert a single row
    async fn insert(&self, table: Table, row: Value) -> Result<()>;

    /// Update columns of the row whose `id` equals `id`
    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<()>;

    /// Open a change subscription for inserts on `table`
    async fn subscribe_inserts(&self, channel: &str, table: Table) -> Result<Subscription>;

    /// The current session, if any
    async fn current_session(&self) -> Result<Option<Session>>;

    /// Sign in with email and password
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    /// Sign out and forget the stored session
    async fn sign_out(&self) -> Result<()>;

    /// Administratively create a pre-confirmed identity
    async fn admin_create_user(&self, email: &str, password: &str) -> Result<NewIdentity>;

    /// Subscribe to session changes
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;

    /// Human-readable backend name for logs and the status bar
    fn name(&self) -> &str;
}

/// Run a query and parse the rows into records
pub async fn select_records<T: Record>(client: &dyn BackendClient, query: &Query) -> Result<Vec<T>> {
    debug_assert_eq!(query.table, T::TABLE);
    let rows = client.select(query).await?;
    parse_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_yields_in_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new("readings", rx, CancellationToken::new());

        tx.send(FeedEvent::Status(FeedStatus::Live)).unwrap();
        tx.send(FeedEvent::Inserted {
            table: "readings".to_string(),
            record: serde_json::json!({"n": 1}),
        })
        .unwrap();

        assert_eq!(sub.next().await, Some(FeedEvent::Status(FeedStatus::Live)));
        match sub.next().await {
            Some(FeedEvent::Inserted { record, .. }) => assert_eq!(record["n"], 1),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_subscription_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sub_token = CancellationToken::new();
        let mut sub = Subscription::new("readings", rx, sub_token.clone());

        sub.cancel();
        tx.send(FeedEvent::Status(FeedStatus::Live)).unwrap();
        assert_eq!(sub.next().await, None);
        assert!(sub_token.is_cancelled());
    }

    #[test]
    fn test_drop_cancels() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        {
            let _sub = Subscription::new("overview", rx, token.clone());
        }
        assert!(token.is_cancelled());
    }
}
