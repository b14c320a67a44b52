//! Error types.
//!
//! Loading is never an error in this engine, and faults inside
//! caller-supplied computations are caught at the invocation boundary
//! and converted back to a loading state. What remains as actual error
//! values is small.

use thiserror::Error;

/// Returned by `Observable::wait_for` when the observable did not
/// produce a value synchronously during the subscribe round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("observable did not produce a value synchronously")]
pub struct WaitError;
