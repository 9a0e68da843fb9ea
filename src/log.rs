// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Structured logging at connection-lifecycle boundaries, gated behind the
//! `tracing` feature. Mirrors the teacher's own `probe-tracing`-gated
//! re-export in its `probe` module: with the feature off, `trace!`/
//! `debug!`/`warn!` expand to nothing rather than pulling in `tracing`'s
//! formatting machinery.

#[cfg(feature = "tracing")]
#[doc(hidden)]
pub use tracing::{debug as __debug, trace as __trace, warn as __warn};

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_noop__ {
    ($($fmt:tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
pub use __log_noop__ as __debug;
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
pub use __log_noop__ as __trace;
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
pub use __log_noop__ as __warn;

pub(crate) use __debug as debug;
pub(crate) use __trace as trace;
pub(crate) use __warn as warn;
