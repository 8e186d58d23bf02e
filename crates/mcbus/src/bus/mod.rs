// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publishers and subscribers bound to message types.

mod publisher;
mod subscriber;

pub use publisher::Publisher;
pub use subscriber::{Subscriber, SubscriberState};
