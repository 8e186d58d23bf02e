// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive-side machinery: handlers, sequence tracking, diagnostics,
//! counters and the subscriber dispatcher.

mod diagnostics;
mod dispatcher;
mod handler;
mod metrics;
mod sequence;

pub use diagnostics::Diagnostic;
pub(crate) use diagnostics::DiagnosticsChannel;
pub use dispatcher::{Dispatcher, SubscriberKey};
pub use handler::{CallbackHandler, Handler, HandlerId, SampleInfo};
pub(crate) use handler::HandlerList;
pub use metrics::{
    PublisherMetrics, PublisherMetricsSnapshot, SubscriberMetrics, SubscriberMetricsSnapshot,
};
pub use sequence::{SequenceEvent, SequenceTracker};
