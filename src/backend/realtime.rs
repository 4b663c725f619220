//! Realtime change feed over the backend's Phoenix websocket
//!
//! One websocket per subscription. After connecting, the feed joins the
//! topic `realtime:<channel>` asking for `INSERT` changes of one table,
//! sends a heartbeat every few seconds and forwards every inserted record
//! as a [`FeedEvent::Inserted`]. Frames are forwarded in arrival order.
//!
//! The feed does not reconnect. When the socket closes or the join is
//! rejected the subscription reports [`FeedStatus::Error`] and ends.

use super::client::{FeedEvent, Subscription};
use crate::error::{DashError, Result};
use crate::types::{FeedStatus, Table};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Topic used for heartbeats
const PHOENIX_TOPIC: &str = "phoenix";

/// Everything needed to open one feed
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Full websocket URL including `apikey` and `vsn`
    pub url: String,
    /// Logical channel name; the topic is `realtime:<channel>`
    pub channel: String,
    /// Table whose inserts are watched
    pub table: Table,
    /// Session token, if signed in
    pub access_token: Option<String>,
    /// Heartbeat period
    pub heartbeat: Duration,
}

impl FeedConfig {
    pub fn topic(&self) -> String {
        format!("realtime:{}", self.channel)
    }
}

/// A frame received from the server, reduced to what the feed acts on
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingFrame {
    /// The join was accepted
    Joined,
    /// The join or the channel failed
    Failed(String),
    /// A row was inserted
    Inserted { table: String, record: Value },
    /// Anything else (heartbeat replies, presence, other topics)
    Ignored,
}

/// `phx_join` frame subscribing to inserts on `table`
pub fn join_frame(topic: &str, table: Table, access_token: Option<&str>, msg_ref: u64) -> String {
    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [
                { "event": "INSERT", "schema": "public", "table": table.name() }
            ]
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = Value::String(token.to_string());
    }
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": payload,
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

/// `phx_leave` frame for a clean teardown
pub fn leave_frame(topic: &str, msg_ref: u64) -> String {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

/// Heartbeat frame keeping the socket alive
pub fn heartbeat_frame(msg_ref: u64) -> String {
    json!({
        "topic": PHOENIX_TOPIC,
        "event": "heartbeat",
        "payload": {},
        "ref": msg_ref.to_string(),
    })
    .to_string()
}

/// Interpret a text frame for `topic`
pub fn parse_frame(text: &str, topic: &str) -> Result<IncomingFrame> {
    let frame: Value = serde_json::from_str(text)?;
    if frame.get("topic").and_then(Value::as_str) != Some(topic) {
        return Ok(IncomingFrame::Ignored);
    }

    let payload = frame.get("payload").cloned().unwrap_or(Value::Null);
    let event = frame.get("event").and_then(Value::as_str).unwrap_or_default();

    let parsed = match event {
        "phx_reply" => match payload.get("status").and_then(Value::as_str) {
            Some("ok") => IncomingFrame::Joined,
            Some(status) => IncomingFrame::Failed(reply_reason(&payload, status)),
            None => IncomingFrame::Ignored,
        },
        "postgres_changes" => {
            let data = payload.get("data").cloned().unwrap_or(Value::Null);
            if data.get("type").and_then(Value::as_str) != Some("INSERT") {
                return Ok(IncomingFrame::Ignored);
            }
            match data.get("record") {
                Some(record) => IncomingFrame::Inserted {
                    table: data
                        .get("table")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    record: record.clone(),
                },
                None => IncomingFrame::Ignored,
            }
        }
        "system" if payload.get("status").and_then(Value::as_str) == Some("error") => {
            IncomingFrame::Failed(
                payload
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("channel error")
                    .to_string(),
            )
        }
        "phx_error" => IncomingFrame::Failed("channel error".to_string()),
        "phx_close" => IncomingFrame::Failed("channel closed".to_string()),
        _ => IncomingFrame::Ignored,
    };
    Ok(parsed)
}

fn reply_reason(payload: &Value, status: &str) -> String {
    payload
        .pointer("/response/reason")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("join {}", status))
}

/// Start a feed task and hand back its subscription
pub fn spawn_feed(config: FeedConfig) -> Subscription {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let channel = config.channel.clone();

    tokio::spawn(async move {
        let _ = tx.send(FeedEvent::Status(FeedStatus::Connecting));
        match run_feed(&config, &tx, &task_cancel).await {
            Ok(()) => {
                tracing::debug!("Feed '{}' stopped", config.channel);
                let _ = tx.send(FeedEvent::Status(FeedStatus::Disconnected));
            }
            Err(e) => {
                tracing::warn!("Feed '{}' failed: {}", config.channel, e);
                let _ = tx.send(FeedEvent::Status(FeedStatus::Error));
            }
        }
    });

    Subscription::new(channel, rx, cancel)
}

/// Run one websocket session until cancelled, closed or failed.
///
/// Returns `Ok` only when cancelled.
async fn run_feed(
    config: &FeedConfig,
    tx: &mpsc::UnboundedSender<FeedEvent>,
    cancel: &CancellationToken,
) -> Result<()> {
    let topic = config.topic();
    let (ws, _) = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        connected = tokio_tungstenite::connect_async(config.url.as_str()) => connected?,
    };
    tracing::info!("Realtime connected, joining {}", topic);

    let (mut write, mut read) = ws.split();
    let mut msg_ref = 1u64;
    write
        .send(Message::Text(
            join_frame(&topic, config.table, config.access_token.as_deref(), msg_ref).into(),
        ))
        .await?;

    let mut heartbeat = tokio::time::interval(config.heartbeat);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                msg_ref += 1;
                let _ = write.send(Message::Text(leave_frame(&topic, msg_ref).into())).await;
                let _ = write.close().await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                msg_ref += 1;
                write.send(Message::Text(heartbeat_frame(msg_ref).into())).await?;
            }
            item = read.next() => {
                let message = match item {
                    Some(message) => message?,
                    None => return Err(DashError::Realtime("websocket closed".to_string())),
                };
                match message {
                    Message::Text(text) => match parse_frame(text.as_str(), &topic) {
                        Ok(IncomingFrame::Joined) => {
                            tracing::info!("Joined {}", topic);
                            let _ = tx.send(FeedEvent::Status(FeedStatus::Live));
                        }
                        Ok(IncomingFrame::Inserted { table, record }) => {
                            if tx.send(FeedEvent::Inserted { table, record }).is_err() {
                                return Ok(());
                            }
                        }
                        Ok(IncomingFrame::Failed(reason)) => {
                            return Err(DashError::Realtime(reason));
                        }
                        Ok(IncomingFrame::Ignored) => {}
                        Err(e) => tracing::debug!("Unreadable realtime frame: {}", e),
                    },
                    Message::Close(_) => {
                        return Err(DashError::Realtime("server closed the socket".to_string()));
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "realtime:readings";

    #[test]
    fn test_join_frame() {
        let frame: Value =
            serde_json::from_str(&join_frame(TOPIC, Table::Readings, Some("jwt"), 1)).unwrap();
        assert_eq!(frame["event"], "phx_join");
        assert_eq!(frame["topic"], TOPIC);
        assert_eq!(frame["ref"], "1");
        assert_eq!(frame["payload"]["access_token"], "jwt");
        let change = &frame["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["schema"], "public");
        assert_eq!(change["table"], "readings");
    }

    #[test]
    fn test_join_frame_without_token() {
        let frame: Value =
            serde_json::from_str(&join_frame(TOPIC, Table::Readings, None, 1)).unwrap();
        assert!(frame["payload"].get("access_token").is_none());
    }

    #[test]
    fn test_heartbeat_frame() {
        let frame: Value = serde_json::from_str(&heartbeat_frame(7)).unwrap();
        assert_eq!(frame["topic"], "phoenix");
        assert_eq!(frame["event"], "heartbeat");
        assert_eq!(frame["ref"], "7");
    }

    #[test]
    fn test_parse_join_reply() {
        let ok = r#"{"topic":"realtime:readings","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        assert_eq!(parse_frame(ok, TOPIC).unwrap(), IncomingFrame::Joined);

        let err = r#"{"topic":"realtime:readings","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"1"}"#;
        assert_eq!(
            parse_frame(err, TOPIC).unwrap(),
            IncomingFrame::Failed("unauthorized".to_string())
        );
    }

    #[test]
    fn test_parse_insert() {
        let text = r#"{"topic":"realtime:readings","event":"postgres_changes","payload":{"data":{"type":"INSERT","schema":"public","table":"readings","commit_timestamp":"2024-03-01T10:00:00Z","record":{"sensor_id":"T-01","timestamp":"2024-03-01T10:00:00+00:00","value":21.5}},"ids":[1]},"ref":null}"#;
        match parse_frame(text, TOPIC).unwrap() {
            IncomingFrame::Inserted { table, record } => {
                assert_eq!(table, "readings");
                assert_eq!(record["sensor_id"], "T-01");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_parse_ignores_other_topics_and_events() {
        let other_topic = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"2"}"#;
        assert_eq!(parse_frame(other_topic, TOPIC).unwrap(), IncomingFrame::Ignored);

        let presence = r#"{"topic":"realtime:readings","event":"presence_state","payload":{},"ref":null}"#;
        assert_eq!(parse_frame(presence, TOPIC).unwrap(), IncomingFrame::Ignored);

        let update = r#"{"topic":"realtime:readings","event":"postgres_changes","payload":{"data":{"type":"UPDATE","record":{}}},"ref":null}"#;
        assert_eq!(parse_frame(update, TOPIC).unwrap(), IncomingFrame::Ignored);
    }

    #[test]
    fn test_parse_system_error() {
        let text = r#"{"topic":"realtime:readings","event":"system","payload":{"status":"error","message":"table not in publication"},"ref":null}"#;
        assert_eq!(
            parse_frame(text, TOPIC).unwrap(),
            IncomingFrame::Failed("table not in publication".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_frame("not json", TOPIC).is_err());
    }

    #[tokio::test]
    async fn test_cancelled_feed_ends_subscription() {
        let mut sub = spawn_feed(FeedConfig {
            url: "ws://127.0.0.1:9/realtime/v1/websocket?apikey=x&vsn=1.0.0".to_string(),
            channel: "analysis".to_string(),
            table: Table::Readings,
            access_token: None,
            heartbeat: Duration::from_secs(30),
        });
        assert_eq!(sub.channel(), "analysis");
        sub.cancel();
        assert_eq!(sub.next().await, None);
    }
}
