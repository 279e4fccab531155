//! Pre-flight diagnostics.
//!
//! This module provides:
//! - The immutable [`DiagnosticsSnapshot`] and its advisories
//! - The [`DiagnosticsCollector`] over a [`HostProbe`]
//! - The advisory-only [`ConnectivityProbe`]

mod collector;
mod connectivity;
mod snapshot;

pub use collector::{DiagnosticsCollector, HostProbe};
pub use connectivity::{check_connectivity, ConnectivityProbe, TcpConnectivityProbe};
pub use snapshot::{
    format_bytes, Advisory, AdvisoryKind, DiagnosticsSnapshot, PowerSource, GIB,
    LOW_DISK_THRESHOLD_BYTES,
};
