//! ---
//! fwm_section: "05-networking-external-interfaces"
//! fwm_subsection: "module"
//! fwm_type: "source"
//! fwm_scope: "code"
//! fwm_description: "Backend client facade and wire normalisation."
//! fwm_version: "v0.0.0-prealpha"
//! fwm_owner: "tbd"
//! ---
//! Realtime row-change channel over a Phoenix-style websocket.
//!
//! One socket carries every subscription. Each (table, change kind) key maps
//! to one channel topic; joins carry the `postgres_changes` config and the
//! current access token. Incoming `postgres_changes` frames are routed through
//! the shared [`SubscriptionRegistry`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{RemoteError, Result};
use crate::subscriptions::{ActiveSubscription, SubscriptionRegistry};
use crate::token::TokenStore;
use crate::types::{ChangeKind, RowChange, RowFilter, SubscriptionKey};

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Derive the websocket endpoint from the REST base url.
pub fn realtime_url(base: &Url, path: &str, api_key: &str) -> Result<Url> {
    let raw = format!("{}{}", base.as_str().trim_end_matches('/'), path);
    let mut url = Url::parse(&raw).map_err(|err| RemoteError::Config(err.to_string()))?;
    let scheme = match url.scheme() {
        "https" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|()| RemoteError::Config(format!("cannot derive websocket url from {raw}")))?;
    url.query_pairs_mut()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Handle on the background socket task.
pub(crate) struct RealtimeConnection {
    outbound: mpsc::UnboundedSender<String>,
    refs: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl RealtimeConnection {
    pub(crate) fn spawn(
        url: Url,
        heartbeat: Duration,
        registry: Arc<SubscriptionRegistry>,
        tokens: TokenStore,
    ) -> Self {
        let (outbound, rx) = mpsc::unbounded_channel();
        let refs = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(run_socket(
            url,
            heartbeat,
            registry,
            tokens,
            rx,
            refs.clone(),
        ));
        Self {
            outbound,
            refs,
            task,
        }
    }

    pub(crate) fn join(&self, key: &SubscriptionKey, filter: Option<&RowFilter>, token: Option<&str>) {
        let frame = join_frame(key, filter, token, next_ref(&self.refs));
        if self.outbound.send(frame).is_err() {
            warn!(key = %key, "realtime socket task has stopped; join dropped");
        }
    }

    pub(crate) fn leave(&self, key: &SubscriptionKey) {
        let frame = leave_frame(key, next_ref(&self.refs));
        let _ = self.outbound.send(frame);
    }
}

impl Drop for RealtimeConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn next_ref(refs: &AtomicU64) -> u64 {
    refs.fetch_add(1, Ordering::Relaxed) + 1
}

pub(crate) fn join_frame(
    key: &SubscriptionKey,
    filter: Option<&RowFilter>,
    token: Option<&str>,
    reference: u64,
) -> String {
    let mut change = json!({
        "event": key.kind.as_ref(),
        "schema": "public",
        "table": key.table,
    });
    if let Some(expression) = filter.and_then(RowFilter::server_expression) {
        change["filter"] = Value::String(expression);
    }
    let mut payload = json!({ "config": { "postgres_changes": [change] } });
    if let Some(token) = token {
        payload["access_token"] = Value::String(token.to_owned());
    }
    json!({
        "topic": key.topic(),
        "event": "phx_join",
        "payload": payload,
        "ref": reference.to_string(),
    })
    .to_string()
}

pub(crate) fn leave_frame(key: &SubscriptionKey, reference: u64) -> String {
    json!({
        "topic": key.topic(),
        "event": "phx_leave",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

fn heartbeat_frame(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

/// Decode a `postgres_changes` frame into a [`RowChange`]. Other frames yield `None`.
pub(crate) fn parse_change_frame(text: &str) -> Option<RowChange> {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "malformed realtime frame");
            return None;
        }
    };
    match frame.get("event").and_then(Value::as_str) {
        Some("postgres_changes") => {}
        Some("phx_reply") => {
            if frame["payload"]["status"].as_str() == Some("error") {
                warn!(topic = %frame["topic"], response = %frame["payload"]["response"], "realtime join rejected");
            }
            return None;
        }
        _ => return None,
    }
    let data = frame.get("payload")?.get("data")?;
    let table = data.get("table")?.as_str()?.to_owned();
    let kind = data.get("type")?.as_str()?.parse::<ChangeKind>().ok()?;
    Some(RowChange {
        table,
        kind,
        new: data.get("record").cloned().unwrap_or(Value::Null),
        old: data.get("old_record").cloned().unwrap_or(Value::Null),
    })
}

fn rejoin_frames(
    active: &[ActiveSubscription],
    token: Option<&str>,
    refs: &AtomicU64,
) -> Vec<String> {
    active
        .iter()
        .map(|sub| join_frame(&sub.key, sub.filter.as_ref(), token, next_ref(refs)))
        .collect()
}

async fn run_socket(
    url: Url,
    heartbeat: Duration,
    registry: Arc<SubscriptionRegistry>,
    tokens: TokenStore,
    mut outbound: mpsc::UnboundedReceiver<String>,
    refs: Arc<AtomicU64>,
) {
    let mut backoff = Duration::from_secs(1);
    let mut reconnecting = false;

    loop {
        match connect_async(url.as_str()).await {
            Ok((socket, _response)) => {
                info!(host = url.host_str().unwrap_or(""), "realtime socket connected");
                backoff = Duration::from_secs(1);
                let (mut sink, mut stream) = socket.split();

                if reconnecting {
                    let token = tokens.access_token();
                    for frame in rejoin_frames(&registry.active(), token.as_deref(), &refs) {
                        if sink.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                }

                let mut ticker = tokio::time::interval(heartbeat);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        frame = outbound.recv() => {
                            let Some(frame) = frame else {
                                let _ = sink.close().await;
                                debug!("realtime socket closed by client");
                                return;
                            };
                            if sink.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        _ = ticker.tick() => {
                            let frame = heartbeat_frame(next_ref(&refs));
                            if sink.send(Message::Text(frame)).await.is_err() {
                                break;
                            }
                        }
                        incoming = stream.next() => {
                            match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    if let Some(change) = parse_change_frame(&text) {
                                        let delivered = registry.dispatch(&change);
                                        debug!(table = %change.table, kind = %change.kind, delivered, "realtime change");
                                    }
                                }
                                Some(Ok(Message::Ping(payload))) => {
                                    if sink.send(Message::Pong(payload)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Err(err)) => {
                                    warn!(error = %err, "realtime socket error");
                                    break;
                                }
                                Some(Ok(_)) => {}
                            }
                        }
                    }
                }
                warn!("realtime socket disconnected");
            }
            Err(err) => warn!(error = %err, backoff_ms = backoff.as_millis() as u64, "realtime connect failed"),
        }

        reconnecting = true;
        // Frames queued while disconnected are superseded by the rejoin.
        let sleep = tokio::time::sleep(backoff);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => break,
                frame = outbound.recv() => {
                    if frame.is_none() {
                        return;
                    }
                }
            }
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
