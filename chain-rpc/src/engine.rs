//! RPC engine orchestrator
//!
//! Owns the connection state machine, the pending/in-flight table, the
//! subscription registry, and the reconnection/health-check timers. One
//! exclusive lock guards all mutable state; caller-visible handlers are
//! dispatched through a separate completion channel so they never run while
//! the lock is held and may safely re-enter the engine.

use crate::policy::ReconnectionPolicy;
use crate::protocol::{self, InboundFrame, NotificationEnvelope, ResponseEnvelope};
use crate::reachability::ReachabilityNotifier;
use crate::scheduler::OneShot;
use crate::store::{Request, RequestStore, SubscriptionRecord, SubscriptionRegistry};
use crate::transport::{Transport, TransportEvent, WebSocketTransport};
use crate::{EngineConfig, RequestId, RpcError};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// WebSocket close code used for owner-initiated teardown.
const CLOSE_NORMAL: u16 = 1000;

/// Connection lifecycle of the engine; exactly one state holds at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Connecting { attempt: u32 },
    Connected,
    WaitingReconnection { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Per-request options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallOptions {
    /// Resend the identical payload after reconnection instead of failing.
    /// Only safe for idempotent requests.
    pub resend_on_reconnect: bool,
}

/// Terminal outcome delivered to a call's handler.
pub type CallResult = crate::Result<Value>;

/// Invoked exactly once per call, off the engine lock.
pub type ResponseHandler = Box<dyn FnOnce(CallResult) + Send + 'static>;

/// Receives a subscription's updates and its terminal failure.
///
/// Explicit trait object rather than a pair of closures so the handler owns
/// its captured state outright.
pub trait SubscriptionHandler: Send + 'static {
    /// A notification routed by remote subscription id.
    fn on_update(&mut self, update: Value);
    /// Terminal failure; no further updates follow.
    fn on_failure(&mut self, error: RpcError);
}

/// Events funneled into the engine's event loop.
pub(crate) enum EngineEvent {
    ReconnectTimer(u64),
    HealthTimer(u64),
    Reachable(bool),
}

/// Caller-visible notifications, executed by the completion task.
enum Completion {
    Respond {
        handler: ResponseHandler,
        result: CallResult,
    },
    Update {
        handler: Arc<Mutex<dyn SubscriptionHandler>>,
        update: Value,
    },
    Fail {
        handler: Arc<Mutex<dyn SubscriptionHandler>>,
        error: RpcError,
    },
}

/// All mutable engine state, guarded by a single lock so no transition can
/// ever be observed half-applied.
struct EngineCore {
    state: ConnectionState,
    store: RequestStore,
    subscriptions: SubscriptionRegistry,
    reconnect_timer: OneShot,
    health_timer: OneShot,
    /// Reason of the most recent drop, reported on policy exhaustion.
    last_drop_reason: Option<String>,
}

struct EngineInner {
    config: EngineConfig,
    policy: Arc<dyn ReconnectionPolicy>,
    transport: Arc<dyn Transport>,
    core: Mutex<EngineCore>,
    completions: mpsc::UnboundedSender<Completion>,
    events: mpsc::UnboundedSender<EngineEvent>,
}

/// The public-facing RPC engine.
///
/// Must be created inside a tokio runtime; background tasks (event loop,
/// completion dispatcher, socket pumps) are spawned at construction. Dropping
/// the engine tears the connection down and cancels all outstanding work.
pub struct RpcEngine {
    inner: Arc<EngineInner>,
}

impl RpcEngine {
    /// Build an engine over a custom transport.
    ///
    /// The factory receives the channel on which the transport must deliver
    /// its events and returns the transport the engine will exclusively own.
    pub fn new<F>(
        config: EngineConfig,
        policy: Arc<dyn ReconnectionPolicy>,
        transport_factory: F,
    ) -> Self
    where
        F: FnOnce(mpsc::UnboundedSender<TransportEvent>) -> Arc<dyn Transport>,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let transport = transport_factory(transport_tx);

        let inner = Arc::new(EngineInner {
            config,
            policy,
            transport,
            core: Mutex::new(EngineCore {
                state: ConnectionState::NotConnected,
                store: RequestStore::new(),
                subscriptions: SubscriptionRegistry::new(),
                reconnect_timer: OneShot::new(),
                health_timer: OneShot::new(),
                last_drop_reason: None,
            }),
            completions: completion_tx,
            events: event_tx,
        });

        tokio::spawn(dispatch_completions(completion_rx));
        tokio::spawn(run_event_loop(
            Arc::downgrade(&inner),
            event_rx,
            transport_rx,
        ));

        Self { inner }
    }

    /// Build an engine over the bundled WebSocket transport.
    pub fn websocket(config: EngineConfig, policy: Arc<dyn ReconnectionPolicy>) -> Self {
        let url = config.url.clone();
        let timeout = config.connection_timeout;
        Self::new(config, policy, move |events| {
            let transport: Arc<dyn Transport> =
                Arc::new(WebSocketTransport::new(url, timeout, events));
            transport
        })
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.lock_core().state.clone()
    }

    /// Ask the engine to open the connection; no-op unless disconnected.
    pub fn connect(&self) {
        self.inner.connect();
    }

    /// Idempotent teardown: cancels timers, fails all outstanding work with
    /// `ClientCancelled`, and closes the socket.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Submit a call; the handler receives exactly one terminal outcome.
    ///
    /// Returns the request id, usable for [`RpcEngine::cancel`]. While not
    /// connected the request is queued, and a connection attempt is triggered
    /// if the engine is idle and configured to autoconnect.
    pub fn call<P: Serialize>(
        &self,
        method: &str,
        params: P,
        options: CallOptions,
        handler: ResponseHandler,
    ) -> crate::Result<RequestId> {
        self.inner
            .start_request(method, params, options, Some(handler), None)
    }

    /// Open a subscription; implies `resend_on_reconnect`.
    ///
    /// The first response to the returned id carries the server-assigned
    /// subscription id; subsequent notifications are routed to the handler by
    /// that remote id until the subscription is cancelled or fails.
    pub fn subscribe<P: Serialize>(
        &self,
        method: &str,
        params: P,
        handler: impl SubscriptionHandler,
    ) -> crate::Result<RequestId> {
        let handler: Arc<Mutex<dyn SubscriptionHandler>> = Arc::new(Mutex::new(handler));
        self.inner.start_request(
            method,
            params,
            CallOptions {
                resend_on_reconnect: true,
            },
            None,
            Some(handler),
        )
    }

    /// Cancel a request or subscription; unknown ids are a no-op.
    ///
    /// A cancelled call's handler fires once with `ClientCancelled`; a
    /// cancelled subscription is forgotten locally without a failure
    /// callback.
    pub fn cancel(&self, id: RequestId) {
        self.inner.cancel(id);
    }

    /// Bounded wrapper: await the call's outcome or time out.
    ///
    /// Compatibility shim for call sites that want request/response shape; a
    /// fired deadline cancels the request and yields [`RpcError::Timeout`].
    /// No engine lock is held across the await.
    pub async fn call_with_timeout<P: Serialize>(
        &self,
        method: &str,
        params: P,
        deadline: Duration,
    ) -> CallResult {
        let (tx, rx) = oneshot::channel();
        let id = self.call(
            method,
            params,
            CallOptions {
                resend_on_reconnect: true,
            },
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        )?;

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RpcError::Unknown),
            Err(_) => {
                self.cancel(id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Attach a reachability notifier; a "became reachable" signal while
    /// waiting out a backoff delay reconnects immediately.
    ///
    /// The notifier's current state is consumed at attach time, so a notifier
    /// attached mid-backoff on a reachable network also short-circuits the
    /// wait.
    pub fn attach_reachability(&self, notifier: Arc<dyn ReachabilityNotifier>) {
        let mut watch = notifier.watch();
        let events = self.inner.events.clone();
        let _ = events.send(EngineEvent::Reachable(notifier.is_reachable()));
        tokio::spawn(async move {
            while let Some(reachable) = watch.recv().await {
                if events.send(EngineEvent::Reachable(reachable)).is_err() {
                    break;
                }
            }
        });
    }
}

impl Drop for RpcEngine {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl EngineInner {
    fn lock_core(&self) -> MutexGuard<'_, EngineCore> {
        // The lock is only held for non-blocking state mutation, so a
        // poisoned lock means a bug already escaped; propagate the panic.
        self.core.lock().expect("engine core lock poisoned")
    }

    fn dispatch(&self, completions: Vec<Completion>) {
        for completion in completions {
            if self.completions.send(completion).is_err() {
                warn!("completion channel closed, dropping notification");
            }
        }
    }

    /// Shared path of `call` and `subscribe`.
    fn start_request<P: Serialize>(
        &self,
        method: &str,
        params: P,
        options: CallOptions,
        handler: Option<ResponseHandler>,
        subscription: Option<Arc<Mutex<dyn SubscriptionHandler>>>,
    ) -> crate::Result<RequestId> {
        let mut frame = None;
        let mut trigger_connect = false;
        let id;
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            id = core.store.allocate_id()?;
            let payload = protocol::encode_request(id, &self.config.version, method, &params)?;
            let seq = core.store.next_seq();
            let is_subscription = subscription.is_some();
            if let Some(sub_handler) = subscription {
                core.subscriptions.insert(SubscriptionRecord {
                    local_id: id,
                    remote_id: None,
                    payload: payload.clone(),
                    handler: sub_handler,
                    seq,
                });
            }
            let request = Request {
                id,
                payload,
                resend_on_reconnect: options.resend_on_reconnect,
                is_subscription,
                handler,
                seq,
            };
            match core.state {
                ConnectionState::Connected => {
                    frame = Some(request.payload.clone());
                    core.store.mark_in_flight(request);
                }
                ConnectionState::NotConnected => {
                    core.store.push_pending(request);
                    if self.config.autoconnect {
                        core.state = ConnectionState::Connecting { attempt: 0 };
                        trigger_connect = true;
                    }
                }
                _ => core.store.push_pending(request),
            }
        }

        if let Some(frame) = frame {
            // A failed send surfaces as a transport disconnect event; the
            // request is then requeued or failed with everything else.
            if let Err(e) = self.transport.send(frame) {
                error!("send of request {} failed: {}", id, e);
            }
        }
        if trigger_connect {
            debug!("request {} submitted while idle, connecting", id);
            self.transport.connect();
        }
        Ok(id)
    }

    fn connect(&self) {
        let mut should_connect = false;
        {
            let mut core = self.lock_core();
            if core.state == ConnectionState::NotConnected {
                core.state = ConnectionState::Connecting { attempt: 0 };
                should_connect = true;
            } else {
                debug!("connect ignored in state {:?}", core.state);
            }
        }
        if should_connect {
            self.transport.connect();
        }
    }

    fn disconnect(&self) {
        let mut completions = Vec::new();
        let was_active;
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            core.reconnect_timer.cancel();
            core.health_timer.cancel();
            for request in core.store.drain_all() {
                if let Some(handler) = request.handler {
                    completions.push(Completion::Respond {
                        handler,
                        result: Err(RpcError::ClientCancelled),
                    });
                }
            }
            for record in core.subscriptions.drain() {
                completions.push(Completion::Fail {
                    handler: record.handler,
                    error: RpcError::ClientCancelled,
                });
            }
            was_active = core.state != ConnectionState::NotConnected;
            core.state = ConnectionState::NotConnected;
            core.last_drop_reason = None;
        }
        if was_active {
            info!("engine disconnecting");
            self.transport.disconnect(CLOSE_NORMAL);
        }
        self.dispatch(completions);
    }

    fn cancel(&self, id: RequestId) {
        let mut completions = Vec::new();
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            if core.subscriptions.remove(id).is_some() {
                // Local-only forget: drop the shadow request silently, no
                // terminal failure for an explicitly cancelled subscription.
                core.store.take_any(id);
                debug!("subscription {} cancelled", id);
            } else if let Some(request) = core.store.take_any(id) {
                if let Some(handler) = request.handler {
                    completions.push(Completion::Respond {
                        handler,
                        result: Err(RpcError::ClientCancelled),
                    });
                }
                debug!("request {} cancelled", id);
            }
        }
        self.dispatch(completions);
    }

    // ── Transport callbacks (event-loop context) ────────────────────────────

    fn on_transport_connected(&self) {
        let mut frames = Vec::new();
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            if !matches!(core.state, ConnectionState::Connecting { .. }) {
                warn!("ignoring connect confirmation in state {:?}", core.state);
                return;
            }
            core.state = ConnectionState::Connected;
            core.last_drop_reason = None;
            for request in core.store.drain_pending() {
                frames.push(request.payload.clone());
                core.store.mark_in_flight(request);
            }
            self.arm_health_check(core);
        }
        info!("connected, flushing {} pending request(s)", frames.len());
        for frame in frames {
            if let Err(e) = self.transport.send(frame) {
                error!("flush failed: {}", e);
                break;
            }
        }
    }

    fn on_transport_closed(&self, reason: Option<String>) {
        let mut completions = Vec::new();
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            match core.state.clone() {
                ConnectionState::Connected => {
                    info!("connection lost: {}", reason.as_deref().unwrap_or("unknown"));
                    core.health_timer.cancel();
                    // Partition in-flight work: idempotent requests and
                    // subscription shadows go back to pending, the rest fail
                    // immediately.
                    for request in core.store.drain_in_flight() {
                        if request.resend_on_reconnect || request.is_subscription {
                            core.store.push_pending(request);
                        } else if let Some(handler) = request.handler {
                            completions.push(Completion::Respond {
                                handler,
                                result: Err(RpcError::RemoteCancelled),
                            });
                        }
                    }
                    // Confirmed subscriptions regenerate their shadow request
                    // for re-registration against the next connection.
                    for record in core.subscriptions.iter_mut() {
                        if record.remote_id.take().is_some() {
                            core.store.push_pending(Request {
                                id: record.local_id,
                                payload: record.payload.clone(),
                                resend_on_reconnect: true,
                                is_subscription: true,
                                handler: None,
                                seq: record.seq,
                            });
                        }
                    }
                    core.store.sort_pending();
                    self.schedule_reconnect(core, 1, reason, &mut completions);
                }
                ConnectionState::Connecting { attempt } => {
                    debug!(
                        "connection attempt {} failed: {}",
                        attempt,
                        reason.as_deref().unwrap_or("unknown")
                    );
                    self.schedule_reconnect(core, attempt + 1, reason, &mut completions);
                }
                state => debug!("transport closed while {:?}, ignoring", state),
            }
        }
        self.dispatch(completions);
    }

    /// Enter `WaitingReconnection{attempt}` if the policy still yields a
    /// delay, otherwise fail every outstanding request and settle at
    /// `NotConnected`.
    fn schedule_reconnect(
        &self,
        core: &mut EngineCore,
        attempt: u32,
        reason: Option<String>,
        completions: &mut Vec<Completion>,
    ) {
        match self.policy.next_delay(attempt.saturating_sub(1)) {
            Some(delay) => {
                info!("reconnection attempt {} in {:?}", attempt, delay);
                core.state = ConnectionState::WaitingReconnection { attempt };
                core.last_drop_reason = reason;
                let events = self.events.clone();
                core.reconnect_timer.arm(delay, move |generation| {
                    let _ = events.send(EngineEvent::ReconnectTimer(generation));
                });
            }
            None => {
                let error = reason
                    .or_else(|| core.last_drop_reason.take())
                    .map(RpcError::Transport)
                    .unwrap_or(RpcError::Unknown);
                warn!(
                    "reconnection policy gave up after {} attempt(s): {}",
                    attempt, error
                );
                for request in core.store.drain_all() {
                    if let Some(handler) = request.handler {
                        completions.push(Completion::Respond {
                            handler,
                            result: Err(error.clone()),
                        });
                    }
                }
                for record in core.subscriptions.drain() {
                    completions.push(Completion::Fail {
                        handler: record.handler,
                        error: error.clone(),
                    });
                }
                core.reconnect_timer.cancel();
                core.state = ConnectionState::NotConnected;
            }
        }
    }

    fn on_reconnect_timer(&self, generation: u64) {
        let mut should_connect = false;
        {
            let mut core = self.lock_core();
            if !core.reconnect_timer.is_current(generation) {
                return;
            }
            if let ConnectionState::WaitingReconnection { attempt } = core.state {
                core.state = ConnectionState::Connecting { attempt };
                should_connect = true;
            }
        }
        if should_connect {
            self.transport.connect();
        }
    }

    fn on_reachable(&self, reachable: bool) {
        if !reachable {
            return;
        }
        let mut should_connect = false;
        {
            let mut core = self.lock_core();
            if matches!(core.state, ConnectionState::WaitingReconnection { .. }) {
                info!("network became reachable, reconnecting immediately");
                core.reconnect_timer.cancel();
                core.state = ConnectionState::Connecting { attempt: 0 };
                should_connect = true;
            }
        }
        if should_connect {
            self.transport.connect();
        }
    }

    fn arm_health_check(&self, core: &mut EngineCore) {
        let interval = self.config.health_check_interval;
        if interval.is_zero() {
            return;
        }
        let events = self.events.clone();
        core.health_timer.arm(interval, move |generation| {
            let _ = events.send(EngineEvent::HealthTimer(generation));
        });
    }

    fn on_health_timer(&self, generation: u64) {
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            if !core.health_timer.is_current(generation) || !core.state.is_connected() {
                return;
            }
            self.arm_health_check(core);
        }
        let method = self.config.health_check_method.clone();
        let outcome = self.start_request(
            &method,
            json!([]),
            CallOptions {
                resend_on_reconnect: false,
            },
            Some(Box::new(|result: CallResult| match result {
                Ok(health) => debug!("health check: {}", health),
                Err(e) => warn!("health check failed: {}", e),
            })),
            None,
        );
        if let Err(e) = outcome {
            warn!("could not issue health check: {}", e);
        }
    }

    // ── Inbound frame routing ───────────────────────────────────────────────

    fn on_frame(&self, raw: String) {
        match protocol::classify(&raw) {
            InboundFrame::Response(response) => self.on_response(response),
            InboundFrame::Notification(notification) => self.on_notification(notification),
            InboundFrame::Malformed(id) => self.on_malformed(id, &raw),
        }
    }

    fn on_response(&self, response: ResponseEnvelope) {
        let mut completions = Vec::new();
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            let Some(request) = core.store.take_in_flight(response.id) else {
                debug!("dropping response for unknown id {}", response.id);
                return;
            };

            if request.is_subscription {
                self.confirm_subscription(core, response, &mut completions);
            } else {
                let result = match (response.result, response.error) {
                    (_, Some(error)) => Err(RpcError::Node {
                        code: error.code,
                        message: error.message,
                        data: error.data,
                    }),
                    (Some(value), None) => Ok(value),
                    (None, None) => Err(RpcError::EmptyResult),
                };
                if let Some(handler) = request.handler {
                    completions.push(Completion::Respond { handler, result });
                }
            }
        }
        self.dispatch(completions);
    }

    /// First response to a subscription's request id: the server's remote id
    /// assignment, not a payload.
    fn confirm_subscription(
        &self,
        core: &mut EngineCore,
        response: ResponseEnvelope,
        completions: &mut Vec<Completion>,
    ) {
        let local_id = response.id;
        let failure = match (response.result, response.error) {
            (_, Some(error)) => Some(RpcError::Node {
                code: error.code,
                message: error.message,
                data: error.data,
            }),
            (Some(value), None) => match value.as_str() {
                Some(remote_id) => {
                    debug!("subscription {} confirmed as {}", local_id, remote_id);
                    if let Some(record) = core.subscriptions.get_mut(local_id) {
                        record.remote_id = Some(remote_id.to_string());
                    }
                    None
                }
                None => Some(RpcError::EmptyResult),
            },
            (None, None) => Some(RpcError::EmptyResult),
        };
        if let Some(error) = failure {
            if let Some(record) = core.subscriptions.remove(local_id) {
                completions.push(Completion::Fail {
                    handler: record.handler,
                    error,
                });
            }
        }
    }

    fn on_notification(&self, notification: NotificationEnvelope) {
        let mut completions = Vec::new();
        {
            let core = self.lock_core();
            match core.subscriptions.by_remote(&notification.params.subscription) {
                Some(record) => completions.push(Completion::Update {
                    handler: record.handler.clone(),
                    update: notification.params.result,
                }),
                None => debug!(
                    "dropping {} notification for unknown subscription {}",
                    notification.method, notification.params.subscription
                ),
            }
        }
        self.dispatch(completions);
    }

    /// Best-effort handling of unparseable frames: a known in-flight id is
    /// failed with `EmptyResult`, anything else is dropped.
    fn on_malformed(&self, id: Option<RequestId>, raw: &str) {
        let mut completions = Vec::new();
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;
            let request = id.and_then(|id| core.store.take_in_flight(id));
            match request {
                Some(request) if request.is_subscription => {
                    if let Some(record) = core.subscriptions.remove(request.id) {
                        completions.push(Completion::Fail {
                            handler: record.handler,
                            error: RpcError::EmptyResult,
                        });
                    }
                }
                Some(request) => {
                    if let Some(handler) = request.handler {
                        completions.push(Completion::Respond {
                            handler,
                            result: Err(RpcError::EmptyResult),
                        });
                    }
                }
                None => debug!("dropping malformed frame ({} bytes)", raw.len()),
            }
        }
        self.dispatch(completions);
    }
}

/// Consume transport events, timer fires, and reachability signals. Holds
/// only a weak reference so dropping the last engine handle ends the loop.
async fn run_event_loop(
    inner: Weak<EngineInner>,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    loop {
        let event = tokio::select! {
            event = transport_events.recv() => match event {
                Some(event) => Either::Transport(event),
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => Either::Engine(event),
                None => break,
            },
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            Either::Transport(TransportEvent::Connected) => inner.on_transport_connected(),
            Either::Transport(TransportEvent::Disconnected { reason }) => {
                inner.on_transport_closed(reason)
            }
            Either::Transport(TransportEvent::Error(e)) => inner.on_transport_closed(Some(e)),
            Either::Transport(TransportEvent::Frame(frame)) => inner.on_frame(frame),
            Either::Engine(EngineEvent::ReconnectTimer(generation)) => {
                inner.on_reconnect_timer(generation)
            }
            Either::Engine(EngineEvent::HealthTimer(generation)) => {
                inner.on_health_timer(generation)
            }
            Either::Engine(EngineEvent::Reachable(reachable)) => inner.on_reachable(reachable),
        }
    }
}

enum Either {
    Transport(TransportEvent),
    Engine(EngineEvent),
}

/// Run caller-visible handlers on their own task, never under the engine
/// lock, so handlers may re-enter the engine without deadlocking.
async fn dispatch_completions(mut completions: mpsc::UnboundedReceiver<Completion>) {
    while let Some(completion) = completions.recv().await {
        match completion {
            Completion::Respond { handler, result } => handler(result),
            Completion::Update { handler, update } => match handler.lock() {
                Ok(mut handler) => handler.on_update(update),
                Err(_) => warn!("subscription handler poisoned, dropping update"),
            },
            Completion::Fail { handler, error } => match handler.lock() {
                Ok(mut handler) => handler.on_failure(error),
                Err(_) => warn!("subscription handler poisoned, dropping failure"),
            },
        }
    }
}
