use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use super::ChannelOpener;
use super::ChannelRead;
use super::RecordChannel;
use crate::wire::ChannelKind;
use crate::wire::RecordFramer;
use crate::ChannelError;
use crate::Error;
use crate::RelayConfig;
use crate::Result;

/// Opens every per-CPU relay file found in `relay.relay_dir`.
#[derive(Debug, Clone)]
pub struct RelayFileOpener {
    config: RelayConfig,
}

impl RelayFileOpener {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Relay files in the directory with their class and CPU number, sorted.
    pub fn discover(&self) -> Result<Vec<(ChannelKind, u32, PathBuf)>> {
        let entries = fs::read_dir(&self.config.relay_dir).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::SubsystemAbsent,
            _ => ChannelError::Open {
                path: self.config.relay_dir.clone(),
                source: e,
            }
            .into(),
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ChannelError::Open {
                path: self.config.relay_dir.clone(),
                source: e,
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some((kind, cpu)) = self.classify(file_name) {
                found.push((kind, cpu, entry.path()));
            }
        }
        found.sort_by_key(|(kind, cpu, _)| (*kind == ChannelKind::Long, *cpu));
        Ok(found)
    }

    fn classify(
        &self,
        file_name: &str,
    ) -> Option<(ChannelKind, u32)> {
        cpu_suffix(file_name, &self.config.long_channel_prefix)
            .map(|cpu| (ChannelKind::Long, cpu))
            .or_else(|| {
                cpu_suffix(file_name, &self.config.short_channel_prefix)
                    .map(|cpu| (ChannelKind::Short, cpu))
            })
    }
}

fn cpu_suffix(
    file_name: &str,
    prefix: &str,
) -> Option<u32> {
    let suffix = file_name.strip_prefix(prefix)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

impl ChannelOpener for RelayFileOpener {
    fn open_channels(&self) -> Result<Vec<Arc<dyn RecordChannel>>> {
        let discovered = self.discover()?;
        if discovered.is_empty() {
            debug!(dir = %self.config.relay_dir.display(), "no relay files found");
            return Err(Error::SubsystemAbsent);
        }

        let mut channels: Vec<Arc<dyn RecordChannel>> = Vec::with_capacity(discovered.len());
        for (kind, _, path) in discovered {
            let channel = RelayFileChannel::open(
                &path,
                kind,
                self.config.read_buffer_size,
                self.config.idle_poll_interval(),
            )?;
            channels.push(Arc::new(channel));
        }
        Ok(channels)
    }
}

#[derive(Debug)]
struct RelayFileState {
    file: tokio::fs::File,
    buffer: Vec<u8>,
    framer: RecordFramer,
}

/// [`RecordChannel`] over one kernel relay file.
///
/// Relay files return zero bytes when drained instead of blocking, so an empty
/// read waits `idle_poll_interval` before trying again.
#[derive(Debug)]
pub struct RelayFileChannel {
    name: String,
    kind: ChannelKind,
    idle_poll_interval: Duration,
    state: Mutex<RelayFileState>,
    closed: CancellationToken,
}

impl RelayFileChannel {
    pub fn open(
        path: &Path,
        kind: ChannelKind,
        read_buffer_size: usize,
        idle_poll_interval: Duration,
    ) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| ChannelError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        debug!(channel = %name, ?kind, "opened relay file");

        Ok(Self {
            name,
            kind,
            idle_poll_interval,
            state: Mutex::new(RelayFileState {
                file: tokio::fs::File::from_std(file),
                buffer: vec![0u8; read_buffer_size],
                framer: RecordFramer::new(kind),
            }),
            closed: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl RecordChannel for RelayFileChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn read_next(&self) -> Result<ChannelRead> {
        let mut state = self.state.lock().await;
        let RelayFileState {
            file,
            buffer,
            framer,
        } = &mut *state;

        loop {
            if self.closed.is_cancelled() {
                return Ok(ChannelRead::EndOfStream);
            }
            if let Some(frame) = framer.next_frame() {
                return Ok(ChannelRead::Record(frame));
            }

            let read = tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Ok(ChannelRead::EndOfStream),
                read = file.read(&mut buffer[..]) => read,
            };
            let n = read.map_err(|e| ChannelError::Read {
                channel: self.name.clone(),
                source: e,
            })?;

            if n == 0 {
                tokio::select! {
                    biased;
                    _ = self.closed.cancelled() => return Ok(ChannelRead::EndOfStream),
                    _ = tokio::time::sleep(self.idle_poll_interval) => {}
                }
                continue;
            }

            trace!(channel = %self.name, bytes = n, pending = framer.pending_len(), "relay file read");
            framer.extend(&buffer[..n]);
        }
    }

    fn close(&self) {
        self.closed.cancel();
    }
}
