//! Single-in-flight command engine.
//!
//! The device does no queuing, so the engine admits one exchange at a time
//! and rejects the rest as busy without touching the transport. An exchange
//! runs entirely inside [`CommandEngine::execute`]: subscribe, write the
//! fragmented command, then wait on the event stream and the deadline until
//! the policy resolves. Timeouts are fed to the policy as a synthesized
//! `Error/TimedOut` response, so they classify exactly like a device
//! reporting one.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sense_metrics::{metric_defs, ExchangeLabels};
use sense_protocol::{Command, CommandKind, FragmentCodec, Response, COMMAND_VERSION_PVT};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::policy::{ResponsePolicy, Verdict};
use crate::transport::{
    with_stack_timeout, CapabilityHandles, EventSink, EventStream, Transport, TransportError,
    TransportEvent,
};

/// The single correlation record. Its presence is the busy flag.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    /// Kind of the command awaiting a response.
    pub kind: CommandKind,
    /// Whether response notifications are enabled.
    pub subscribed: bool,
    /// When the exchange was admitted.
    pub started_at: Instant,
}

/// Clears the pending slot when the exchange ends, however it ends.
struct ExchangeGuard<'a> {
    slot: &'a Mutex<Option<PendingExchange>>,
}

impl Drop for ExchangeGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Runs command exchanges against one peripheral.
pub struct CommandEngine<T: Transport + ?Sized> {
    transport: Arc<T>,
    events: tokio::sync::Mutex<EventStream>,
    injector: EventSink,
    pending: Mutex<Option<PendingExchange>>,
    handles: Mutex<Option<CapabilityHandles>>,
    command_version: AtomicU32,
    fragment_size: usize,
    stack_timeout: Duration,
}

impl<T: Transport + ?Sized> CommandEngine<T> {
    /// Create an engine reading transport events from `events`.
    pub fn new(
        transport: Arc<T>,
        events: EventStream,
        fragment_size: usize,
        stack_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            injector: events.sink(),
            events: tokio::sync::Mutex::new(events),
            pending: Mutex::new(None),
            handles: Mutex::new(None),
            command_version: AtomicU32::new(COMMAND_VERSION_PVT),
            fragment_size,
            stack_timeout,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Command version used for the next command.
    pub fn command_version(&self) -> u32 {
        self.command_version.load(Ordering::SeqCst)
    }

    /// Whether an exchange is pending.
    pub fn is_busy(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Snapshot of the pending exchange, if any.
    pub fn pending(&self) -> Option<PendingExchange> {
        self.pending.lock().clone()
    }

    /// Whether capability handles are attached.
    pub fn has_capabilities(&self) -> bool {
        self.handles.lock().is_some()
    }

    /// Attach the handles of a new session.
    ///
    /// Events queued before this point belong to an earlier session and are
    /// discarded.
    pub async fn attach(&self, handles: CapabilityHandles) {
        let stale = self.events.lock().await.drain();
        if !stale.is_empty() {
            debug!("{}: discarded {} stale events", self.address(), stale.len());
        }
        *self.handles.lock() = Some(handles);
    }

    /// Forget the session's handles after a local disconnect.
    ///
    /// A pending exchange is resolved with connection loss.
    pub fn detach(&self) {
        self.handles.lock().take();
        if self.is_busy() {
            self.injector.disconnected(self.address());
        }
    }

    fn address(&self) -> &str {
        self.transport.address()
    }

    /// Run one exchange.
    ///
    /// Resolves exactly once: with the policy's output, the policy's error,
    /// or a transport failure. Returns [`Error::Busy`] immediately if
    /// another exchange is pending.
    ///
    /// Dropping the future abandons the exchange: the engine is free again
    /// at once, but notifications stay enabled until the next exchange
    /// subscribes or the link is closed with a disconnect.
    pub async fn execute<P>(&self, command: Command, timeout: Duration, mut policy: P) -> Result<P::Output>
    where
        P: ResponsePolicy,
    {
        let labels = ExchangeLabels::new(self.address(), command.kind.name());

        let _guard = {
            let mut pending = self.pending.lock();
            if pending.is_some() {
                metrics::counter!(metric_defs::EXCHANGE_BUSY.name, &labels.to_labels()).increment(1);
                debug!("{}: rejecting {}, busy", self.address(), command.kind);
                return Err(Error::Busy);
            }
            *pending = Some(PendingExchange {
                kind: command.kind,
                subscribed: false,
                started_at: Instant::now(),
            });
            ExchangeGuard {
                slot: &self.pending,
            }
        };
        metrics::counter!(metric_defs::EXCHANGE_STARTED.name, &labels.to_labels()).increment(1);

        let started_at = Instant::now();
        let result = self.run(&command, timeout, &mut policy, &labels).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!(metric_defs::EXCHANGE_RESOLVED.name, &labels.with_outcome(outcome)).increment(1);
        metrics::histogram!(metric_defs::EXCHANGE_DURATION.name, &labels.with_outcome(outcome))
            .record(started_at.elapsed().as_secs_f64());
        result
    }

    async fn run<P>(
        &self,
        command: &Command,
        timeout: Duration,
        policy: &mut P,
        labels: &ExchangeLabels,
    ) -> Result<P::Output>
    where
        P: ResponsePolicy,
    {
        let handles = self.handles.lock().clone().ok_or_else(|| Error::Transport {
            operation: "execute",
            source: TransportError::NotConnected,
        })?;

        let mut events = self.events.lock().await;
        for event in events.drain() {
            match event {
                TransportEvent::Disconnected { address } if address == self.address() => {
                    debug!("{}: link dropped before {}", self.address(), command.kind);
                    self.handles.lock().take();
                    return Err(Error::ConnectionLost);
                }
                event => debug!("{}: discarding stale event {:?}", self.address(), event),
            }
        }

        let mut codec = FragmentCodec::with_unit_size(self.fragment_size);
        let fragments = codec.split(&command.encode()?)?;

        if let Err(e) = self
            .stack(
                "enable_notifications",
                self.transport.enable_notifications(&handles.response),
            )
            .await
        {
            return match e {
                Error::ConnectionLost => self.connection_lost(command, policy),
                e => Err(e),
            };
        }
        self.set_subscribed(true);
        debug!("{}: subscribed for {}", self.address(), command.kind);

        for fragment in &fragments {
            if let Err(e) = self
                .stack(
                    "write_fragment",
                    self.transport.write_fragment(&handles.command, fragment.as_ref()),
                )
                .await
            {
                if matches!(e, Error::ConnectionLost) {
                    return self.connection_lost(command, policy);
                }
                if let Err(ue) = self.unsubscribe(&handles).await {
                    warn!("{}: unsubscribe after failed write failed: {}", self.address(), ue);
                }
                return Err(e);
            }
        }
        metrics::counter!(metric_defs::FRAGMENTS_WRITTEN.name, "peripheral" => labels.peripheral.clone())
            .increment(fragments.len() as u64);
        info!(
            "{}: sent {} v{} ({} fragments)",
            self.address(),
            command.kind,
            command.version,
            fragments.len()
        );

        let mut deadline = Instant::now() + timeout;
        loop {
            let response = tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(TransportEvent::Notification(data)) => {
                        metrics::counter!(metric_defs::FRAGMENTS_RECEIVED.name, "peripheral" => labels.peripheral.clone())
                            .increment(1);
                        let message = match codec.feed(&data) {
                            Ok(Some(message)) => message,
                            Ok(None) => continue,
                            Err(e) => return self.finish(&handles, Err(e.into())).await,
                        };
                        match Response::decode(&message) {
                            Ok(response) => {
                                self.command_version.store(response.version, Ordering::SeqCst);
                                info!("{}: received {} v{}", self.address(), response.kind, response.version);
                                response
                            }
                            Err(e) => return self.finish(&handles, Err(e.into())).await,
                        }
                    }
                    Some(TransportEvent::Disconnected { address }) => {
                        if address != self.address() {
                            continue;
                        }
                        return self.connection_lost(command, policy);
                    }
                    None => return Err(Error::ConnectionLost),
                },

                _ = tokio::time::sleep_until(deadline) => {
                    warn!("{}: {} timed out after {:?}", self.address(), command.kind, timeout);
                    metrics::counter!(metric_defs::EXCHANGE_TIMED_OUT.name, &labels.to_labels()).increment(1);
                    Response::timed_out(self.command_version())
                }
            };

            match policy.on_response(command, response) {
                Verdict::Continue => deadline = Instant::now() + timeout,
                Verdict::Resolve(result) => return self.finish(&handles, result).await,
                Verdict::ResolveAndDisconnect(output) => {
                    self.teardown().await;
                    return Ok(output);
                }
            }
        }
    }

    /// The link dropped mid-exchange. Resolves without unsubscribing; the
    /// policy may treat the loss as success.
    fn connection_lost<P>(&self, command: &Command, policy: &mut P) -> Result<P::Output>
    where
        P: ResponsePolicy,
    {
        self.handles.lock().take();
        self.set_subscribed(false);
        match policy.on_connection_lost(command) {
            Some(output) => {
                info!("{}: link dropped after {}, treating as accepted", self.address(), command.kind);
                Ok(output)
            }
            None => {
                warn!("{}: link dropped during {}", self.address(), command.kind);
                Err(Error::ConnectionLost)
            }
        }
    }

    /// Unsubscribe, then resolve.
    async fn finish<O>(&self, handles: &CapabilityHandles, result: Result<O>) -> Result<O> {
        match (result, self.unsubscribe(handles).await) {
            (Ok(output), Ok(())) => Ok(output),
            (Ok(_), Err(unsubscribe)) => Err(unsubscribe),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unsubscribe)) => Err(e.with_cause(unsubscribe)),
        }
    }

    async fn unsubscribe(&self, handles: &CapabilityHandles) -> Result<()> {
        if !self.transport.is_connected() {
            debug!("{}: not connected, skipping unsubscribe", self.address());
            self.set_subscribed(false);
            return Ok(());
        }
        self.stack(
            "disable_notifications",
            self.transport.disable_notifications(&handles.response),
        )
        .await?;
        self.set_subscribed(false);
        debug!("{}: unsubscribed", self.address());
        Ok(())
    }

    async fn teardown(&self) {
        if let Err(e) = self.stack("disconnect", self.transport.disconnect()).await {
            warn!("{}: disconnect after command failed, ignoring: {}", self.address(), e);
        }
        self.handles.lock().take();
    }

    async fn stack<F, R>(&self, operation: &'static str, fut: F) -> Result<R>
    where
        F: std::future::Future<Output = Result<R, TransportError>>,
    {
        with_stack_timeout(operation, self.stack_timeout, fut).await
    }

    fn set_subscribed(&self, subscribed: bool) {
        if let Some(pending) = self.pending.lock().as_mut() {
            pending.subscribed = subscribed;
        }
    }
}
