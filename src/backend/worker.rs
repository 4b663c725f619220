//! Backend Worker Thread Implementation
//!
//! This module contains the main worker loop that runs in a separate thread
//! and handles all backend calls. It communicates with the UI thread
//! through crossbeam channels.
//!
//! # Responsibilities
//!
//! The worker thread handles:
//!
//! - **Command processing**: Responds to UI commands (sign in, fetch, create, etc.)
//! - **Async dispatch**: Each command runs as a task on the worker's tokio runtime
//! - **Subscriptions**: Keeps at most one insert feed per view channel
//! - **Session events**: Forwards sign-in/sign-out events to the UI
//! - **Statistics tracking**: Counts successful and failed requests
//!
//! Results of a task are only reported back as [`BackendMessage`]s. A task
//! never blocks the loop, so a slow request cannot delay the next command.

use crate::backend::client::{BackendClient, FeedEvent};
use crate::backend::query::{timestamp_param, Direction, Query};
use crate::backend::session::AuthEvent;
use crate::backend::{BackendCommand, BackendMessage};
use crate::aggregator::TimeWindow;
use crate::catalog::EntityCache;
use crate::error::{DashError, Result};
use crate::forms::{NewEntity, NewUser};
use crate::history::HistoryWindow;
use crate::types::{parse_row, parse_rows, BackendStats, FeedStatus, Reading, Role, Table, User};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

/// How long the loop waits for a command before doing periodic work
const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How often statistics are pushed to the UI
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Request counters shared by all tasks
#[derive(Debug, Default)]
struct StatsCounters {
    requests_ok: AtomicU64,
    requests_failed: AtomicU64,
    events_received: AtomicU64,
}

impl StatsCounters {
    fn record<T>(&self, result: &Result<T>) {
        let counter = if result.is_ok() {
            &self.requests_ok
        } else {
            &self.requests_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BackendStats {
        BackendStats {
            requests_ok: self.requests_ok.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            events_received: self.events_received.load(Ordering::Relaxed),
        }
    }
}

/// Everything a spawned task needs
#[derive(Clone)]
struct TaskContext {
    client: Arc<dyn BackendClient>,
    messages: Sender<BackendMessage>,
    cache: Arc<tokio::sync::Mutex<EntityCache>>,
    stats: Arc<StatsCounters>,
}

impl TaskContext {
    fn send(&self, message: BackendMessage) {
        if self.messages.send(message).is_err() {
            tracing::debug!("UI receiver gone, dropping message");
        }
    }

    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let result = self.client.select(query).await;
        self.stats.record(&result);
        result
    }

    async fn insert(&self, table: Table, row: Value) -> Result<()> {
        let result = self.client.insert(table, row).await;
        self.stats.record(&result);
        result
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<()> {
        let result = self.client.update(table, id, patch).await;
        self.stats.record(&result);
        result
    }

    /// Refetch the catalog and publish it if it changed
    async fn refresh_catalog(&self) {
        let mut cache = self.cache.lock().await;
        let before = cache.generation();
        let snapshot = cache.refresh(self.client.as_ref()).await;
        if cache.generation() != before {
            self.stats.requests_ok.fetch_add(1, Ordering::Relaxed);
            self.send(BackendMessage::Catalog(snapshot));
        } else {
            self.stats.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn load_session(&self) {
        match self.client.current_session().await {
            Ok(session) => self.send(BackendMessage::Session(session.map(|s| s.user))),
            Err(e) => {
                tracing::warn!("Session restore failed: {}", e);
                self.send(BackendMessage::AuthError(e.to_string()));
                self.send(BackendMessage::Session(None));
            }
        }
    }

    async fn sign_in(&self, email: String, password: String) {
        // Success is reported through the auth event forwarder
        match self.client.sign_in_with_password(&email, &password).await {
            Ok(session) => tracing::info!("Signed in as {}", session.user.id),
            Err(e) => {
                tracing::warn!("Sign-in failed: {}", e);
                self.send(BackendMessage::AuthError(e.to_string()));
            }
        }
    }

    async fn sign_out(&self) {
        if let Err(e) = self.client.sign_out().await {
            tracing::warn!("Sign-out request failed: {}", e);
        }
    }

    async fn fetch_recent_readings(&self, limit: usize) -> Result<Vec<Reading>> {
        let query = Query::select(Table::Readings)
            .order("timestamp", Direction::Descending)
            .limit(limit);
        parse_rows(self.select(&query).await?)
    }

    /// One range query per sensor; any failure fails the whole fetch
    async fn fetch_readings(
        &self,
        sensors: &[String],
        window: TimeWindow,
    ) -> Result<HashMap<String, Vec<Reading>>> {
        let start = timestamp_param(&window.start);
        let end = timestamp_param(&window.end);
        let fetches = sensors.iter().map(|sensor_id| {
            let query = Query::select(Table::Readings)
                .eq("sensor_id", sensor_id.clone())
                .gte("timestamp", start.clone())
                .lte("timestamp", end.clone())
                .order("timestamp", Direction::Ascending);
            async move {
                let readings: Vec<Reading> = parse_rows(self.select(&query).await?)?;
                Ok::<_, DashError>((sensor_id.clone(), readings))
            }
        });
        let per_sensor = futures::future::try_join_all(fetches).await?;
        Ok(per_sensor.into_iter().collect())
    }

    async fn fetch_history(&self, sensor_id: &str, window: HistoryWindow) -> Result<Vec<Reading>> {
        let start = window.start(chrono::Utc::now());
        let query = Query::select(Table::Readings)
            .eq("sensor_id", sensor_id)
            .gte("timestamp", timestamp_param(&start))
            .order("timestamp", Direction::Ascending);
        parse_rows(self.select(&query).await?)
    }

    async fn create(&self, entity: NewEntity) -> Result<()> {
        let table = entity.table();
        self.insert(table, entity.to_row()?).await?;
        tracing::info!("Created row in {}", table);
        self.send(BackendMessage::Created { table });
        self.refresh_catalog().await;
        Ok(())
    }

    async fn fetch_users(&self) {
        let query = Query::select(Table::Users).order("created_at", Direction::Descending);
        let users = match self.select(&query).await {
            Ok(rows) => parse_rows::<User>(rows),
            Err(e) => Err(e),
        };
        match users {
            Ok(users) => self.send(BackendMessage::Users(users)),
            Err(e) => tracing::error!("Fetching users failed: {}", e),
        }
    }

    /// Identity first, then the profile row. A failed second step leaves
    /// the identity behind.
    async fn create_user(&self, user: NewUser) -> Result<()> {
        let identity = self
            .client
            .admin_create_user(&user.email, &user.password)
            .await;
        self.stats.record(&identity);
        let identity = identity?;
        self.insert(Table::Users, user.profile_row(&identity.id))
            .await
            .map_err(|e| e.with_context("Storing user profile"))?;
        tracing::info!("Created user {} with role {}", user.email, user.role.as_str());
        self.send(BackendMessage::UserCreated { email: user.email });
        self.fetch_users().await;
        Ok(())
    }

    async fn update_role(&self, user_id: String, role: Role) -> Result<()> {
        self.update(Table::Users, &user_id, json!({ "role": role }))
            .await?;
        self.send(BackendMessage::RoleUpdated { user_id, role });
        self.fetch_users().await;
        Ok(())
    }

    /// Forward events of one subscription until it ends or is cancelled
    async fn pump_feed(&self, channel: String, cancel: CancellationToken) {
        let mut subscription = match self.client.subscribe_inserts(&channel, Table::Readings).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!("Subscribing {} failed: {}", channel, e);
                self.send(BackendMessage::FeedStatus {
                    channel,
                    status: FeedStatus::Error,
                });
                return;
            }
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                event = subscription.next() => event,
            };
            match event {
                Some(FeedEvent::Status(status)) => {
                    tracing::debug!("Feed {} is {}", channel, status);
                    self.send(BackendMessage::FeedStatus {
                        channel: channel.clone(),
                        status,
                    });
                }
                Some(FeedEvent::Inserted { table, record }) => {
                    if table != Table::Readings.name() {
                        continue;
                    }
                    self.stats.events_received.fetch_add(1, Ordering::Relaxed);
                    match parse_row::<Reading>(record) {
                        Ok(reading) => self.send(BackendMessage::ReadingInserted {
                            channel: channel.clone(),
                            reading,
                        }),
                        Err(e) => tracing::warn!("Skipping malformed insert on {}: {}", channel, e),
                    }
                }
                None => break,
            }
        }
        tracing::debug!("Feed {} closed", channel);
    }
}

/// Main backend worker that processes commands
pub struct BackendWorker {
    /// Runtime every backend call runs on
    runtime: Runtime,
    /// Shared state handed to tasks
    ctx: TaskContext,
    /// Command receiver
    command_rx: Receiver<BackendCommand>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Cancelled once when the worker stops
    shutdown: CancellationToken,
    /// Open subscriptions by view channel
    subscriptions: HashMap<String, CancellationToken>,
    /// Last time statistics were pushed
    last_stats: Instant,
}

impl BackendWorker {
    /// Create a new backend worker
    pub fn new(
        client: Arc<dyn BackendClient>,
        command_rx: Receiver<BackendCommand>,
        message_tx: Sender<BackendMessage>,
        running: Arc<AtomicBool>,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("backend-io")
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            ctx: TaskContext {
                client,
                messages: message_tx,
                cache: Arc::new(tokio::sync::Mutex::new(EntityCache::new())),
                stats: Arc::new(StatsCounters::default()),
            },
            command_rx,
            running,
            shutdown: CancellationToken::new(),
            subscriptions: HashMap::new(),
            last_stats: Instant::now(),
        })
    }

    /// Run `task` until the worker stops
    pub fn spawn_background(&self, task: BoxFuture<'static, ()>) {
        self.spawn(task);
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = task => {}
            }
        });
    }

    /// Main worker loop
    pub fn run(mut self) {
        tracing::info!("Backend worker started ({})", self.ctx.client.name());
        self.ctx.send(BackendMessage::Ready {
            backend: self.ctx.client.name().to_string(),
        });
        self.forward_auth_events();

        while self.running.load(Ordering::Relaxed) {
            match self.command_rx.recv_timeout(COMMAND_POLL_INTERVAL) {
                Ok(cmd) => self.handle_command(cmd),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!("Command channel disconnected, stopping backend");
                    self.running.store(false, Ordering::Relaxed);
                }
            }

            if self.last_stats.elapsed() >= STATS_INTERVAL {
                self.last_stats = Instant::now();
                self.ctx.send(BackendMessage::Stats(self.ctx.stats.snapshot()));
            }
        }

        self.shutdown.cancel();
        self.subscriptions.clear();
        self.runtime.shutdown_timeout(Duration::from_millis(500));
        self.ctx.send(BackendMessage::Shutdown);
        tracing::info!("Backend worker stopped");
    }

    /// Translate session events into [`BackendMessage::Session`]
    fn forward_auth_events(&self) {
        let mut events = self.ctx.client.auth_events();
        let ctx = self.ctx.clone();
        self.spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn(user)) => ctx.send(BackendMessage::Session(Some(user))),
                    Ok(AuthEvent::SignedOut) => ctx.send(BackendMessage::Session(None)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} auth events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: BackendCommand) {
        let ctx = self.ctx.clone();
        match cmd {
            BackendCommand::LoadSession => self.spawn(async move { ctx.load_session().await }),
            BackendCommand::SignIn { email, password } => {
                self.spawn(async move { ctx.sign_in(email, password).await })
            }
            BackendCommand::SignOut => self.spawn(async move { ctx.sign_out().await }),
            BackendCommand::RefreshCatalog => self.spawn(async move { ctx.refresh_catalog().await }),
            BackendCommand::FetchRecentReadings { limit } => self.spawn(async move {
                match ctx.fetch_recent_readings(limit).await {
                    Ok(readings) => ctx.send(BackendMessage::RecentReadings(readings)),
                    Err(e) => tracing::error!("Fetching recent readings failed: {}", e),
                }
            }),
            BackendCommand::FetchReadings { sensors, window } => self.spawn(async move {
                match ctx.fetch_readings(&sensors, window).await {
                    Ok(per_sensor) => ctx.send(BackendMessage::Readings { per_sensor }),
                    Err(e) => {
                        tracing::error!("Fetching readings failed: {}", e);
                        ctx.send(BackendMessage::ReadingsFailed(e.to_string()));
                    }
                }
            }),
            BackendCommand::FetchHistory { sensor_id, window } => self.spawn(async move {
                match ctx.fetch_history(&sensor_id, window).await {
                    Ok(readings) => ctx.send(BackendMessage::History {
                        sensor_id,
                        window,
                        readings,
                    }),
                    Err(e) => {
                        tracing::error!("Fetching history of {} failed: {}", sensor_id, e);
                        ctx.send(BackendMessage::HistoryFailed { sensor_id });
                    }
                }
            }),
            BackendCommand::Subscribe { channel } => self.subscribe(channel),
            BackendCommand::Unsubscribe { channel } => {
                if let Some(token) = self.subscriptions.remove(&channel) {
                    token.cancel();
                    tracing::debug!("Unsubscribed {}", channel);
                    self.ctx.send(BackendMessage::FeedStatus {
                        channel,
                        status: FeedStatus::Disconnected,
                    });
                }
            }
            BackendCommand::Create(entity) => self.spawn(async move {
                if let Err(e) = ctx.create(entity).await {
                    tracing::error!("Create failed: {}", e);
                }
            }),
            BackendCommand::FetchUsers => self.spawn(async move { ctx.fetch_users().await }),
            BackendCommand::CreateUser(user) => self.spawn(async move {
                if let Err(e) = ctx.create_user(user).await {
                    tracing::error!("Creating user failed: {}", e);
                    ctx.send(BackendMessage::UserCreateFailed(e.to_string()));
                }
            }),
            BackendCommand::UpdateRole { user_id, role } => self.spawn(async move {
                if let Err(e) = ctx.update_role(user_id, role).await {
                    tracing::error!("Updating role failed: {}", e);
                }
            }),
            BackendCommand::RequestStats => {
                self.ctx.send(BackendMessage::Stats(self.ctx.stats.snapshot()));
            }
            BackendCommand::Shutdown => {
                tracing::info!("Shutdown requested");
                self.running.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Open a feed for `channel`, replacing any previous one
    fn subscribe(&mut self, channel: String) {
        let token = self.shutdown.child_token();
        if let Some(previous) = self.subscriptions.insert(channel.clone(), token.clone()) {
            tracing::debug!("Replacing subscription {}", channel);
            previous.cancel();
        }
        let ctx = self.ctx.clone();
        self.spawn(async move { ctx.pump_feed(channel, token).await });
    }
}
