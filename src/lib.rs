//! Userspace relay for kernel provenance capture.
//!
//! The kernel emits tagged binary records on per-CPU relay channels. This
//! crate reads them, decodes them into typed [`Record`]s, applies the local
//! [`FilterPolicy`] and hands each record to the application handler
//! registered for its tag through [`ProvenanceOps`]. It also exposes the
//! kernel's control switches and the disclosure path through [`Provenance`].
//!
//! [`SimulatedKernel`] stands in for the kernel module when it is not loaded.
mod config;
mod constants;
mod errors;
mod provenance;
mod registry;
mod relay;
mod utils;

pub mod channel;
pub mod control;
pub mod dispatch;
pub mod filter;
pub mod metrics;
pub mod simulated;
pub mod wire;

pub use config::*;
pub use errors::*;
pub use provenance::*;
pub use registry::ChannelInfo;
pub use registry::LifecycleState;

pub use channel::ChannelOpener;
pub use channel::ChannelRead;
pub use channel::RecordChannel;
pub use control::ControlChannel;
pub use control::SecurityFsControl;
pub use dispatch::DispatchOutcome;
pub use dispatch::ProvenanceOps;
pub use filter::EdgeType;
pub use filter::FilterMask;
pub use filter::FilterPolicy;
pub use filter::NodeType;
pub use metrics::RelayStats;
pub use metrics::RelayStatsSnapshot;
pub use simulated::SimulatedKernel;
pub use wire::Record;
pub use wire::RecordTag;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
