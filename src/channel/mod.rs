//! Record channels.
//!
//! A [`RecordChannel`] yields one raw record per [`RecordChannel::read_next`]
//! call. Kernels expose one short and one long channel per CPU
//! ([`RelayFileChannel`]); tests and the [`crate::SimulatedKernel`] use
//! [`MemoryChannel`].
mod memory;
mod relay_file;
pub use memory::*;
pub use relay_file::*;


use std::sync::Arc;

use async_trait::async_trait;

use crate::wire::ChannelKind;
use crate::Result;

/// Outcome of one channel read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRead {
    /// One framed raw record
    Record(Vec<u8>),
    /// The channel was closed or its producer went away
    EndOfStream,
}

#[async_trait]
pub trait RecordChannel: Send + Sync + 'static {
    /// Stable name used in logs and metrics, e.g. `provenance0`.
    fn name(&self) -> &str;

    fn kind(&self) -> ChannelKind;

    /// Waits for the next raw record.
    ///
    /// # Errors
    /// `Error::Channel(ChannelError::Read)` when the underlying source fails.
    /// The relay loop owning this channel terminates on it.
    async fn read_next(&self) -> Result<ChannelRead>;

    /// Idempotent. A pending or later `read_next` returns
    /// [`ChannelRead::EndOfStream`] promptly.
    fn close(&self);
}

/// Produces the set of record channels a registration relays from.
pub trait ChannelOpener: Send + Sync + 'static {
    /// # Errors
    /// - `Error::SubsystemAbsent` when no channel exists
    /// - `Error::Channel(ChannelError::Open)` when a channel cannot be opened
    fn open_channels(&self) -> Result<Vec<Arc<dyn RecordChannel>>>;
}
