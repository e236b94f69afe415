use std::io;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::ChannelRead;
use super::RecordChannel;
use crate::wire::ChannelKind;
use crate::ChannelError;
use crate::Result;

#[derive(Debug)]
enum MemoryFrame {
    Data(Vec<u8>),
    Failure(io::ErrorKind, String),
}

/// In-process [`RecordChannel`] fed by a [`MemoryChannelSender`].
#[derive(Debug)]
pub struct MemoryChannel {
    name: String,
    kind: ChannelKind,
    receiver: Mutex<mpsc::UnboundedReceiver<MemoryFrame>>,
    closed: CancellationToken,
}

/// Producer half of a [`MemoryChannel`]. Dropping every clone ends the stream.
#[derive(Debug, Clone)]
pub struct MemoryChannelSender {
    name: String,
    sender: mpsc::UnboundedSender<MemoryFrame>,
}

/// Creates a connected sender/channel pair.
pub fn memory_channel(
    name: impl Into<String>,
    kind: ChannelKind,
) -> (MemoryChannelSender, MemoryChannel) {
    let name = name.into();
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        MemoryChannelSender {
            name: name.clone(),
            sender,
        },
        MemoryChannel {
            name,
            kind,
            receiver: Mutex::new(receiver),
            closed: CancellationToken::new(),
        },
    )
}

impl MemoryChannelSender {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues one raw frame. Returns `false` once the channel is gone.
    pub fn send(
        &self,
        frame: Vec<u8>,
    ) -> bool {
        self.sender.send(MemoryFrame::Data(frame)).is_ok()
    }

    /// Makes the next read after the queued frames fail.
    pub fn fail(
        &self,
        kind: io::ErrorKind,
        message: impl Into<String>,
    ) -> bool {
        self.sender
            .send(MemoryFrame::Failure(kind, message.into()))
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[async_trait]
impl RecordChannel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn read_next(&self) -> Result<ChannelRead> {
        if self.closed.is_cancelled() {
            return Ok(ChannelRead::EndOfStream);
        }

        let mut receiver = self.receiver.lock().await;
        let frame = tokio::select! {
            biased;
            _ = self.closed.cancelled() => None,
            frame = receiver.recv() => frame,
        };

        match frame {
            None => Ok(ChannelRead::EndOfStream),
            Some(MemoryFrame::Data(bytes)) => {
                trace!(channel = %self.name, len = bytes.len(), "memory channel frame");
                Ok(ChannelRead::Record(bytes))
            }
            Some(MemoryFrame::Failure(kind, message)) => Err(ChannelError::Read {
                channel: self.name.clone(),
                source: io::Error::new(kind, message),
            }
            .into()),
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}
