// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Subscriber: one inbound endpoint, one receive thread, ordered handlers.
//!
//! # Lifecycle
//!
//! ```text
//! Created --open--> Open --close--> Closed
//!                    |
//!                    +--hard receive error--> Failed
//! ```
//!
//! `Closed` and `Failed` are terminal. Closing joins the receive thread, so
//! once `close` returns no handler of this subscriber is running.

use crate::config::{BusConfig, DIAGNOSTICS_CAPACITY, RECV_BUFFER_LEN};
use crate::engine::{
    CallbackHandler, Diagnostic, DiagnosticsChannel, Handler, HandlerId, HandlerList, SampleInfo,
    SequenceEvent, SequenceTracker, SubscriberMetrics, SubscriberMetricsSnapshot,
};
use crate::error::{Error, Result};
use crate::schema::{FieldValues, MessageType};
use crate::transport::{endpoint_for, open_transport, MulticastEndpoint, Role, Transport};
use crate::wire::decode_frame_for;
use crossbeam::channel::Receiver;
use parking_lot::Mutex;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

/// Lifecycle state of a `Subscriber`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriberState {
    Created,
    Open,
    Closed,
    Failed,
}

impl SubscriberState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// State shared between the owner and the receive thread.
struct Shared {
    message_type: Arc<MessageType>,
    endpoint: MulticastEndpoint,
    handlers: HandlerList,
    metrics: SubscriberMetrics,
    diagnostics: DiagnosticsChannel,
    state: Mutex<SubscriberState>,
}

/// Receive thread handle; the thread hands its transport back when it exits.
struct Running {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Box<dyn Transport>>,
}

/// Inbound connection for one message type.
pub struct Subscriber {
    shared: Arc<Shared>,
    config: BusConfig,
    running: Mutex<Option<Running>>,
}

impl Subscriber {
    /// Create a subscriber at the endpoint allocated for the type's name.
    ///
    /// No socket is opened until `open`.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when the namespace is invalid.
    pub fn new(message_type: Arc<MessageType>, config: &BusConfig) -> Result<Self> {
        let endpoint = endpoint_for(message_type.name(), &config.namespace)?;
        Ok(Self::with_endpoint(message_type, endpoint, config))
    }

    /// Create a subscriber at an explicit endpoint (e.g. from an `AddressAllocator`).
    pub fn with_endpoint(
        message_type: Arc<MessageType>,
        endpoint: MulticastEndpoint,
        config: &BusConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                message_type,
                endpoint,
                handlers: HandlerList::new(),
                metrics: SubscriberMetrics::new(),
                diagnostics: DiagnosticsChannel::new(DIAGNOSTICS_CAPACITY),
                state: Mutex::new(SubscriberState::Created),
            }),
            config: config.clone(),
            running: Mutex::new(None),
        }
    }

    pub fn message_type(&self) -> &Arc<MessageType> {
        &self.shared.message_type
    }

    pub fn type_name(&self) -> &str {
        self.shared.message_type.name()
    }

    pub fn endpoint(&self) -> MulticastEndpoint {
        self.shared.endpoint
    }

    pub fn state(&self) -> SubscriberState {
        *self.shared.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SubscriberState::Open
    }

    /// Register a handler; it sees every message decoded after this call.
    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> HandlerId {
        self.shared.handlers.add(handler)
    }

    /// Register a closure as a handler.
    pub fn register_fn<F>(&self, callback: F) -> HandlerId
    where
        F: Fn(&str, &FieldValues, &SampleInfo) + Send + Sync + 'static,
    {
        self.register_handler(Arc::new(CallbackHandler::new(callback)))
    }

    /// Remove a handler. Returns `false` if it was not registered.
    ///
    /// A message already being delivered may still reach the handler.
    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.shared.handlers.remove(id)
    }

    pub fn handler_count(&self) -> usize {
        self.shared.handlers.len()
    }

    #[must_use]
    pub fn metrics(&self) -> SubscriberMetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Diagnostic events (per-frame rejects, gaps, handler panics, failure).
    pub fn diagnostics(&self) -> Receiver<Diagnostic> {
        self.shared.diagnostics.subscribe()
    }

    /// Open the socket and start the receive thread.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidState` unless the subscriber is `Created`
    /// - `Error::Transport` when the socket cannot be set up (state stays `Created`)
    pub fn open(&self) -> Result<()> {
        let mut running = self.running.lock();
        let state = self.state();
        if state != SubscriberState::Created {
            return Err(Error::InvalidState(format!(
                "cannot open subscriber '{}' in state {}",
                self.type_name(),
                state
            )));
        }

        let transport = open_transport(
            &self.config.mode,
            self.shared.endpoint,
            Role::Subscriber,
            &self.config.transport,
        )?;

        let stop = Arc::new(AtomicBool::new(false));
        let ctx = LoopContext {
            shared: Arc::clone(&self.shared),
            stop: Arc::clone(&stop),
            timeout: self.config.transport.receive_timeout,
        };

        *self.shared.state.lock() = SubscriberState::Open;
        let spawned = std::thread::Builder::new()
            .name(format!("mcbus-rx-{}", self.type_name()))
            .spawn(move || run_loop(ctx, transport));
        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                *self.shared.state.lock() = SubscriberState::Created;
                return Err(Error::transport("spawn receive thread", e));
            }
        };
        *running = Some(Running { stop, thread });

        log::info!(
            "[RX] subscriber '{}' open on {}",
            self.type_name(),
            self.shared.endpoint
        );
        Ok(())
    }

    /// Stop the receive thread, join it and release the socket.
    ///
    /// No-op for `Created` and `Closed`. From `Failed` the socket is released
    /// and the state stays `Failed`.
    ///
    /// # Errors
    ///
    /// `Error::Transport` when leaving the multicast group fails; the socket
    /// is released anyway.
    pub fn close(&self) -> Result<()> {
        let mut running = self.running.lock();
        let Some(Running { stop, thread }) = running.take() else {
            return Ok(());
        };

        stop.store(true, Ordering::Release);
        let result = match thread.join() {
            Ok(mut transport) => transport.close(),
            Err(_) => {
                log::error!("[RX] receive thread of '{}' panicked", self.type_name());
                Ok(())
            }
        };

        let mut state = self.shared.state.lock();
        if *state == SubscriberState::Open {
            *state = SubscriberState::Closed;
        }
        log::info!(
            "[RX] subscriber '{}' closed (state={})",
            self.type_name(),
            *state
        );
        result
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("[RX] close on drop failed: {}", e);
        }
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("type", &self.type_name())
            .field("endpoint", &self.shared.endpoint)
            .field("state", &self.state())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

// ===== Receive loop =====

struct LoopContext {
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    timeout: Duration,
}

fn run_loop(ctx: LoopContext, mut transport: Box<dyn Transport>) -> Box<dyn Transport> {
    let type_name = ctx.shared.message_type.name().to_string();
    log::debug!(
        "[RX] loop started type={} thread={:?}",
        type_name,
        std::thread::current().id()
    );

    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let mut tracker = SequenceTracker::new();

    while !ctx.stop.load(Ordering::Acquire) {
        match transport.receive(&mut buf, ctx.timeout) {
            Ok(None) => {}
            Ok(Some(received)) => {
                process_datagram(&ctx.shared, &mut tracker, &buf[..received.len], received.source);
            }
            Err(e) => {
                log::error!("[RX] '{}' receive failed, loop stopping: {}", type_name, e);
                *ctx.shared.state.lock() = SubscriberState::Failed;
                ctx.shared.diagnostics.emit(
                    Diagnostic::TransportFailed {
                        reason: e.to_string(),
                    },
                    &ctx.shared.metrics,
                );
                break;
            }
        }
    }

    log::debug!("[RX] loop exited type={}", type_name);
    transport
}

fn process_datagram(
    shared: &Shared,
    tracker: &mut SequenceTracker,
    datagram: &[u8],
    source: SocketAddr,
) {
    let received_at = SystemTime::now();
    let metrics = &shared.metrics;
    metrics.frames_received.fetch_add(1, Ordering::Relaxed);
    metrics
        .bytes_received
        .fetch_add(datagram.len() as u64, Ordering::Relaxed);

    let frame = match decode_frame_for(&shared.message_type, datagram) {
        Ok(frame) => frame,
        Err(e) => {
            let e = e.with_endpoint(shared.endpoint);
            let counter = match &e {
                Error::Protocol { .. } => &metrics.protocol_errors,
                Error::SchemaMismatch { .. } => &metrics.schema_mismatches,
                _ => &metrics.decode_errors,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            log::warn!("[RX] dropped frame from {}: {}", source, e);
            shared
                .diagnostics
                .emit(Diagnostic::from_frame_error(&e, source), metrics);
            return;
        }
    };

    let header = frame.header;
    match tracker.observe(source, header.sequence) {
        SequenceEvent::First | SequenceEvent::InOrder => {}
        SequenceEvent::Gap {
            expected,
            received,
            missing,
        } => {
            metrics.sequence_gaps.fetch_add(missing, Ordering::Relaxed);
            log::debug!(
                "[RX] gap from {}: expected {} got {} ({} missing)",
                source,
                expected,
                received,
                missing
            );
            shared.diagnostics.emit(
                Diagnostic::SequenceGap {
                    source,
                    expected,
                    received,
                    missing,
                },
                metrics,
            );
        }
        SequenceEvent::Restart { last, received } => {
            log::info!(
                "[RX] {} restarted its sequence: last {} got {}",
                source,
                last,
                received
            );
        }
        SequenceEvent::Reorder { last, received } => {
            metrics.sequence_reorders.fetch_add(1, Ordering::Relaxed);
            log::debug!("[RX] reorder from {}: last {} got {}", source, last, received);
            shared.diagnostics.emit(
                Diagnostic::SequenceReorder {
                    source,
                    last,
                    received,
                },
                metrics,
            );
        }
    }

    let info = SampleInfo {
        sequence: header.sequence,
        sent_at_us: header.timestamp_us,
        received_at,
        source,
        fingerprint: header.fingerprint,
    };
    log::debug!(
        "[RX] deliver type={} seq={} len={} src={}",
        shared.message_type.name(),
        header.sequence,
        datagram.len(),
        source
    );

    let panics = shared
        .handlers
        .deliver(shared.message_type.name(), &frame.values, &info);
    metrics.messages_delivered.fetch_add(1, Ordering::Relaxed);
    if panics > 0 {
        metrics
            .handler_panics
            .fetch_add(panics as u64, Ordering::Relaxed);
        shared.diagnostics.emit(
            Diagnostic::HandlerPanicked {
                sequence: header.sequence,
                panics,
            },
            metrics,
        );
    }
}
