//! Per-channel relay loop: read, decode, dispatch.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::channel::ChannelRead;
use crate::channel::RecordChannel;
use crate::dispatch::Dispatcher;
use crate::wire::decode;
use crate::RelayStats;
use crate::Result;

/// Why a relay loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelayExit {
    /// Shutdown token cancelled
    Shutdown,
    /// Channel reported end of stream
    EndOfStream,
}

pub(crate) struct RelayLoop {
    channel: Arc<dyn RecordChannel>,
    dispatcher: Dispatcher,
    stats: Arc<RelayStats>,
    shutdown: CancellationToken,
}

impl RelayLoop {
    pub(crate) fn new(
        channel: Arc<dyn RecordChannel>,
        dispatcher: Dispatcher,
        stats: Arc<RelayStats>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            channel,
            dispatcher,
            stats,
            shutdown,
        }
    }

    /// Relays records until shutdown, end of stream or a channel failure.
    ///
    /// Malformed records are counted and skipped. A channel read error ends
    /// this loop only and is returned to the caller.
    pub(crate) async fn run(self) -> Result<RelayExit> {
        let name = self.channel.name().to_string();
        let kind = self.channel.kind();
        debug!(channel = %name, %kind, "relay loop started");

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    debug!(channel = %name, "relay loop received shutdown signal");
                    return Ok(RelayExit::Shutdown);
                }
                read = self.channel.read_next() => read,
            };

            let bytes = match read {
                Ok(ChannelRead::Record(bytes)) => bytes,
                Ok(ChannelRead::EndOfStream) => {
                    debug!(channel = %name, "relay channel reached end of stream");
                    return Ok(RelayExit::EndOfStream);
                }
                Err(e) => {
                    error!(channel = %name, error = %e, "relay channel failed, stopping loop");
                    self.stats.record_channel_error(&name);
                    return Err(e);
                }
            };

            self.stats.record_received(&name);
            match decode(&bytes, kind) {
                Ok(record) => {
                    let tag = record.tag();
                    let outcome = self.dispatcher.dispatch(record);
                    trace!(channel = %name, %tag, ?outcome, "record dispatched");
                }
                Err(e) => {
                    warn!(channel = %name, error = %e, len = bytes.len(), "dropping malformed record");
                    self.stats.record_decode_error(e.kind());
                }
            }
        }
    }
}

impl std::fmt::Debug for RelayLoop {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RelayLoop")
            .field("channel", &self.channel.name())
            .field("kind", &self.channel.kind())
            .finish()
    }
}

/// Runs `relay`, discarding the exit reason.
pub(crate) async fn run_relay(relay: RelayLoop) -> Result<()> {
    relay.run().await.map(|_| ())
}
