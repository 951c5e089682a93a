//! Live connection handle
//!
//! A [`LiveConnection`] owns one logical DDP session. A background driver
//! task opens the transport through a [`Connector`], performs the handshake,
//! dispatches incoming messages and reconnects after a drop when
//! `transport.retry` is on. Handles are cheap to clone and all clones refer
//! to the same session.

use crate::collection::Collection;
use crate::config::ConnectionOptions;
use crate::error::{ClientError, Result};
use crate::login::{LoginRequest, LoginResult, LoginStatus};
use crate::status::{ConnectionStatus, StatusKind};
use livepool_core::RecordId;
use livepool_network::{Connector, Duplex, Message, preferred_version};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type CloseHook = Box<dyn FnOnce() + Send>;
type ReconnectHook = Arc<dyn Fn(&LiveConnection) + Send + Sync>;

#[derive(Default)]
struct HookState {
    closed: bool,
    hooks: Vec<CloseHook>,
}

struct Inner {
    options: ConnectionOptions,
    status_tx: watch::Sender<ConnectionStatus>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    pending_calls: Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>,
    pending_subs: Mutex<HashMap<String, oneshot::Sender<Result<()>>>>,
    next_id: AtomicU64,
    collections: Mutex<HashMap<String, Collection>>,
    hooks: Mutex<HookState>,
    login_status: OnceLock<LoginStatus>,
    reconnect_hook: Mutex<Option<ReconnectHook>>,
    /// DDP session id from the last `connected`
    session: Mutex<Option<String>>,
    record_id: OnceLock<RecordId>,
    cancel: CancellationToken,
}

impl Inner {
    /// Offline is terminal
    fn set_status(&self, update: impl FnOnce(&mut ConnectionStatus)) {
        self.status_tx.send_if_modified(|status| {
            if status.kind == StatusKind::Offline {
                return false;
            }
            update(status);
            true
        });
    }

    /// Forget the current transport and fail everything waiting on it
    fn drop_transport(&self, err: ClientError) {
        self.outbound.lock().take();

        let calls: Vec<_> = self.pending_calls.lock().drain().map(|(_, tx)| tx).collect();
        for waiter in calls {
            let _ = waiter.send(Err(err.clone()));
        }
        let subs: Vec<_> = self.pending_subs.lock().drain().map(|(_, tx)| tx).collect();
        for waiter in subs {
            let _ = waiter.send(Err(err.clone()));
        }
    }

    fn collection_for(&self, name: &str) -> Collection {
        self.collections
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Collection::new(name))
            .clone()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Handle to a live DDP connection
#[derive(Clone)]
pub struct LiveConnection {
    inner: Arc<Inner>,
}

impl LiveConnection {
    /// Start connecting to `options.url`
    ///
    /// Returns immediately; use [`wait_connected`](Self::wait_connected) to
    /// wait for the handshake. Must be called inside a Tokio runtime.
    pub fn open(connector: Arc<dyn Connector>, options: ConnectionOptions) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ClientError::ConnectionFailed(e.to_string()))?;

        let (status_tx, _) = watch::channel(ConnectionStatus::connecting());
        let inner = Arc::new(Inner {
            options,
            status_tx,
            outbound: Mutex::new(None),
            pending_calls: Mutex::new(HashMap::new()),
            pending_subs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            collections: Mutex::new(HashMap::new()),
            hooks: Mutex::new(HookState::default()),
            login_status: OnceLock::new(),
            reconnect_hook: Mutex::new(None),
            session: Mutex::new(None),
            record_id: OnceLock::new(),
            cancel: CancellationToken::new(),
        });

        debug!(url = %inner.options.url, "opening connection");
        runtime.spawn(drive(Arc::downgrade(&inner), connector, inner.cancel.clone()));
        Ok(Self { inner })
    }

    pub fn url(&self) -> &str {
        &self.inner.options.url
    }

    /// Current status snapshot
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status_tx.borrow().clone()
    }

    /// Receiver that observes every status change
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// Wait until the handshake completes or the connection dies
    pub async fn wait_connected(&self) -> Result<()> {
        let mut rx = self.inner.status_tx.subscribe();
        let status = rx
            .wait_for(|s| s.connected || s.is_dead())
            .await
            .map_err(|_| ClientError::Closed)?
            .clone();

        match status.kind {
            _ if status.connected => Ok(()),
            StatusKind::Offline => Err(ClientError::Closed),
            _ => Err(ClientError::ConnectionFailed(
                status.reason.unwrap_or_else(|| status.kind.to_string()),
            )),
        }
    }

    /// Whether both handles refer to the same connection
    pub fn ptr_eq(&self, other: &LiveConnection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.hooks.lock().closed
    }

    /// Associate this connection with a pool record; only the first call takes effect
    pub fn bind_record(&self, id: RecordId) -> bool {
        self.inner.record_id.set(id).is_ok()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.inner.record_id.get().copied()
    }

    fn next_id(&self) -> String {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn send(&self, msg: &Message) -> Result<()> {
        let text = msg
            .to_text()
            .map_err(|e| ClientError::SendFailed(e.to_string()))?;
        if self.inner.cancel.is_cancelled() {
            return Err(ClientError::Closed);
        }
        let outbound = self.inner.outbound.lock();
        let tx = outbound.as_ref().ok_or(ClientError::NotConnected)?;
        tx.send(text).map_err(|_| ClientError::Disconnected)
    }

    /// Call a server method and wait for its result
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.inner.pending_calls.lock().insert(id.clone(), tx);

        let msg = Message::Method {
            method: method.to_string(),
            params,
            id: id.clone(),
        };
        if let Err(e) = self.send(&msg) {
            self.inner.pending_calls.lock().remove(&id);
            return Err(e);
        }
        rx.await.unwrap_or(Err(ClientError::Closed))
    }

    /// Subscribe and wait until the subscription is ready; returns its id
    pub async fn subscribe(&self, name: &str, params: Vec<Value>) -> Result<String> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.inner.pending_subs.lock().insert(id.clone(), tx);

        let msg = Message::Sub {
            id: id.clone(),
            name: name.to_string(),
            params,
        };
        if let Err(e) = self.send(&msg) {
            self.inner.pending_subs.lock().remove(&id);
            return Err(e);
        }
        rx.await.unwrap_or(Err(ClientError::Closed))?;
        Ok(id)
    }

    pub fn unsubscribe(&self, id: &str) -> Result<()> {
        self.send(&Message::Unsub { id: id.to_string() })
    }

    /// Call the server's `login` method
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResult> {
        let reply = self.call("login", vec![request.to_param()]).await?;
        LoginResult::from_value(reply).ok_or(ClientError::NoToken)
    }

    /// Record the login outcome; only the first call takes effect
    pub fn set_login_status(&self, status: LoginStatus) -> bool {
        self.inner.login_status.set(status).is_ok()
    }

    pub fn login_status(&self) -> Option<LoginStatus> {
        self.inner.login_status.get().cloned()
    }

    /// Hook run after every successful handshake
    pub fn set_reconnect_hook(&self, hook: impl Fn(&LiveConnection) + Send + Sync + 'static) {
        *self.inner.reconnect_hook.lock() = Some(Arc::new(hook));
    }

    /// Run the reconnect hook now, if one is set
    pub fn run_reconnect_hook(&self) {
        let hook = self.inner.reconnect_hook.lock().clone();
        if let Some(hook) = hook {
            hook(self);
        }
    }

    /// Register a callback run when the connection closes
    ///
    /// Callbacks run once, newest first. Registering on a closed connection
    /// runs the callback immediately.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        let mut state = self.inner.hooks.lock();
        if state.closed {
            drop(state);
            hook();
            return;
        }
        state.hooks.push(Box::new(hook));
    }

    /// Close the connection and run the close hooks; later calls do nothing
    pub fn close(&self) {
        let hooks = {
            let mut state = self.inner.hooks.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.hooks)
        };

        self.inner.cancel.cancel();
        self.inner.drop_transport(ClientError::Closed);
        self.inner.reconnect_hook.lock().take();
        self.inner.status_tx.send_modify(|status| {
            status.kind = StatusKind::Offline;
            status.connected = false;
        });
        info!(url = %self.inner.options.url, "connection closed");

        for hook in hooks.into_iter().rev() {
            hook();
        }
    }

    /// Mirrored collection `name`, once the server has sent documents for it
    pub fn collection(&self, name: &str) -> Option<Collection> {
        self.inner.collections.lock().get(name).cloned()
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.collections.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Handle one server message; `false` ends the session
    fn dispatch(&self, msg: Message) -> bool {
        if let Some(name) = msg.collection() {
            self.inner.collection_for(name).apply(&msg);
            return true;
        }

        match msg {
            Message::Connected { session } => {
                *self.inner.session.lock() = Some(session);
                self.inner.set_status(|status| {
                    status.kind = StatusKind::Connected;
                    status.connected = true;
                    status.retry_count = 0;
                    status.reason = None;
                });
                info!(url = %self.inner.options.url, "connected");
                self.run_reconnect_hook();
            }
            Message::Failed { version } => {
                let reason = format!("DDP version negotiation failed; server wants {}", version);
                warn!(url = %self.inner.options.url, "{}", reason);
                self.inner.drop_transport(ClientError::Disconnected);
                self.inner.set_status(|status| {
                    status.kind = StatusKind::Failed;
                    status.connected = false;
                    status.reason = Some(reason);
                });
                return false;
            }
            Message::Ping { id } => {
                let _ = self.send(&Message::Pong { id });
            }
            Message::Result { id, result, error } => {
                let waiter = self.inner.pending_calls.lock().remove(&id);
                if let Some(waiter) = waiter {
                    let outcome = match error {
                        Some(error) => Err(ClientError::Method(error)),
                        None => Ok(result.unwrap_or(Value::Null)),
                    };
                    let _ = waiter.send(outcome);
                }
            }
            Message::Ready { subs } => {
                let waiters: Vec<_> = {
                    let mut pending = self.inner.pending_subs.lock();
                    subs.iter().filter_map(|id| pending.remove(id)).collect()
                };
                for waiter in waiters {
                    let _ = waiter.send(Ok(()));
                }
            }
            Message::Nosub { id, error } => {
                let waiter = self.inner.pending_subs.lock().remove(&id);
                if let Some(waiter) = waiter {
                    let reason = error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| format!("subscription {} stopped", id));
                    let _ = waiter.send(Err(ClientError::Subscription(reason)));
                }
            }
            Message::Error { reason, .. } => {
                warn!(url = %self.inner.options.url, "server reported error: {}", reason);
            }
            Message::Pong { .. } | Message::Updated { .. } => {}
            other => {
                debug!(url = %self.inner.options.url, "ignoring message: {:?}", other);
            }
        }
        true
    }
}

impl fmt::Debug for LiveConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnection")
            .field("url", &self.inner.options.url)
            .field("record_id", &self.record_id())
            .field("status", &self.status().kind)
            .finish()
    }
}

enum SessionEnd {
    /// Closed, dropped or failed; do not reconnect
    Stopped,
    /// Transport went away
    Lost,
}

async fn drive(weak: Weak<Inner>, connector: Arc<dyn Connector>, cancel: CancellationToken) {
    let (url, transport) = match weak.upgrade() {
        Some(inner) => (inner.options.url.clone(), inner.options.transport.clone()),
        None => return,
    };

    loop {
        let opened = tokio::select! {
            _ = cancel.cancelled() => return,
            opened = connector.open(&url, &transport) => opened,
        };

        let reason = match opened {
            Ok(duplex) => match run_session(&weak, duplex, &cancel).await {
                SessionEnd::Stopped => return,
                SessionEnd::Lost => "connection lost".to_string(),
            },
            Err(e) => {
                if transport.quiet_errors {
                    debug!(url = %url, "connect attempt failed: {}", e);
                } else {
                    warn!(url = %url, "connect attempt failed: {}", e);
                }
                e.to_string()
            }
        };

        let Some(inner) = weak.upgrade() else { return };
        inner.drop_transport(ClientError::Disconnected);
        if !transport.retry {
            inner.set_status(|status| {
                status.kind = StatusKind::Failed;
                status.connected = false;
                status.reason = Some(reason);
            });
            return;
        }
        inner.set_status(|status| {
            status.kind = StatusKind::Waiting;
            status.connected = false;
            status.retry_count += 1;
            status.reason = Some(reason);
        });
        drop(inner);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(transport.reconnect_delay()) => {}
        }

        match weak.upgrade() {
            Some(inner) => inner.set_status(|status| status.kind = StatusKind::Connecting),
            None => return,
        }
    }
}

async fn run_session(weak: &Weak<Inner>, duplex: Duplex, cancel: &CancellationToken) -> SessionEnd {
    let Duplex {
        outbound,
        mut inbound,
    } = duplex;

    {
        let Some(inner) = weak.upgrade() else {
            return SessionEnd::Stopped;
        };
        let support = inner.options.support.clone();
        let handshake = Message::Connect {
            version: preferred_version(&support).to_string(),
            support,
            session: inner.session.lock().clone(),
        };
        let text = match handshake.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode handshake: {}", e);
                return SessionEnd::Lost;
            }
        };
        if outbound.send(text).is_err() {
            return SessionEnd::Lost;
        }

        let mut slot = inner.outbound.lock();
        if cancel.is_cancelled() {
            return SessionEnd::Stopped;
        }
        *slot = Some(outbound);
    }

    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Stopped,
            raw = inbound.recv() => raw,
        };
        let Some(raw) = raw else {
            return SessionEnd::Lost;
        };
        let msg = match Message::parse(&raw) {
            Ok(msg) => msg,
            Err(e) => {
                debug!("ignoring frame: {}", e);
                continue;
            }
        };
        let Some(inner) = weak.upgrade() else {
            return SessionEnd::Stopped;
        };
        if !(LiveConnection { inner }).dispatch(msg) {
            return SessionEnd::Stopped;
        }
    }
}
