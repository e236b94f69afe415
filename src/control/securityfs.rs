use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::trace;

use super::ControlChannel;
use super::DisclosureKind;
use super::Flag;
use super::FilterOp;
use super::Word;
use crate::constants::ENABLE_FILE;
use crate::constants::SELF_FILE;
use crate::filter::FilterTarget;
use crate::ControlConfig;
use crate::Error;
use crate::Result;

/// [`ControlChannel`] over the provenance securityfs directory.
///
/// Flags are ASCII `1`/`0`, words are 4-byte little-endian, a filter update
/// is `mask u32` followed by `op u32`.
#[derive(Debug, Clone)]
pub struct SecurityFsControl {
    dir: PathBuf,
}

impl SecurityFsControl {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &ControlConfig) -> Self {
        Self::new(config.securityfs_dir.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(
        &self,
        endpoint: &str,
    ) -> PathBuf {
        self.dir.join(endpoint)
    }

    fn read(
        &self,
        endpoint: &'static str,
        operation: &'static str,
    ) -> Result<Vec<u8>> {
        let bytes = fs::read(self.path(endpoint)).map_err(|e| map_io_error(endpoint, operation, e))?;
        trace!(endpoint, len = bytes.len(), "read control endpoint");
        Ok(bytes)
    }

    fn write(
        &self,
        endpoint: &'static str,
        operation: &'static str,
        payload: &[u8],
    ) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(self.path(endpoint))
            .map_err(|e| map_io_error(endpoint, operation, e))?;
        file.write_all(payload)
            .map_err(|e| map_io_error(endpoint, operation, e))?;
        debug!(endpoint, operation, len = payload.len(), "wrote control endpoint");
        Ok(())
    }
}

impl ControlChannel for SecurityFsControl {
    fn probe(&self) -> bool {
        self.dir.is_dir() && self.path(ENABLE_FILE).exists()
    }

    fn get_flag(
        &self,
        flag: Flag,
    ) -> Result<bool> {
        let bytes = self.read(flag.endpoint(), flag.get_operation())?;
        parse_flag(flag.endpoint(), &bytes)
    }

    fn set_flag(
        &self,
        flag: Flag,
        value: bool,
    ) -> Result<()> {
        let payload: &[u8] = if value { b"1" } else { b"0" };
        self.write(flag.endpoint(), flag.set_operation(), payload)
    }

    fn get_u32(
        &self,
        word: Word,
    ) -> Result<u32> {
        let bytes = self.read(word.endpoint(), word.get_operation())?;
        parse_word(word.endpoint(), &bytes)
    }

    fn set_u32(
        &self,
        word: Word,
        value: u32,
    ) -> Result<()> {
        self.write(word.endpoint(), word.set_operation(), &value.to_le_bytes())
    }

    fn update_filter(
        &self,
        target: FilterTarget,
        op: FilterOp,
        mask: u32,
    ) -> Result<()> {
        let mut payload = [0u8; 8];
        payload[..4].copy_from_slice(&mask.to_le_bytes());
        payload[4..].copy_from_slice(&op.wire_value().to_le_bytes());
        self.write(Word::for_filter(target).endpoint(), op.operation(target), &payload)
    }

    fn submit_disclosure(
        &self,
        kind: DisclosureKind,
        payload: &[u8],
    ) -> Result<()> {
        self.write(kind.endpoint(), kind.operation(), payload)
    }

    fn read_self(&self) -> Result<Vec<u8>> {
        self.read(SELF_FILE, "self_record")
    }
}

/// Maps an endpoint I/O failure onto the control error taxonomy.
pub(crate) fn map_io_error(
    endpoint: &'static str,
    operation: &'static str,
    err: io::Error,
) -> Error {
    match err.kind() {
        io::ErrorKind::PermissionDenied => Error::PermissionDenied { operation },
        io::ErrorKind::NotFound => Error::SubsystemAbsent,
        _ => Error::Control { endpoint, source: err },
    }
}

fn parse_flag(
    endpoint: &'static str,
    bytes: &[u8],
) -> Result<bool> {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'1') => Ok(true),
        Some(b'0') => Ok(false),
        _ => Err(Error::Control {
            endpoint,
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected ASCII 0 or 1, got {bytes:?}"),
            ),
        }),
    }
}

fn parse_word(
    endpoint: &'static str,
    bytes: &[u8],
) -> Result<u32> {
    match bytes.get(..4) {
        Some(raw) => {
            let mut word = [0u8; 4];
            word.copy_from_slice(raw);
            Ok(u32::from_le_bytes(word))
        }
        None => Err(Error::Control {
            endpoint,
            source: io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected 4 bytes, got {}", bytes.len()),
            ),
        }),
    }
}
