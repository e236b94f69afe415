use super::decode;
use super::ChannelKind;
use super::RecordTag;
use super::WIRE_VERSION;

/// Splits a contiguous relay byte stream into single-record frames.
///
/// Short frames are sized from the tag table and long frames from their
/// length field. Bytes that cannot start a record are emitted as one reject
/// frame reaching up to the next plausible header, so the decoder counts them
/// and the records behind them still come through. A declared length that is
/// still waiting for bytes is given up once a complete record follows it.
#[derive(Debug)]
pub struct RecordFramer {
    kind: ChannelKind,
    pending: Vec<u8>,
}

/// What the pending bytes at one offset look like as a record header.
enum Header {
    /// Not enough bytes to tell yet
    Partial,
    /// Cannot start a record on this channel
    Invalid,
    /// Plausible header of a record of this total length
    Frame(usize),
}

impl RecordFramer {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            pending: Vec::new(),
        }
    }

    pub fn extend(
        &mut self,
        bytes: &[u8],
    ) {
        self.pending.extend_from_slice(bytes);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Next complete frame, or `None` when more bytes are needed.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let frame_len = match self.header_at(0) {
            Header::Partial => return None,
            Header::Frame(len) if len <= self.pending.len() => len,
            Header::Frame(_) => self.next_complete_record(1)?,
            Header::Invalid => self.next_header(1),
        };
        Some(self.pending.drain(..frame_len).collect())
    }

    /// First offset from `from` that is not known to be garbage.
    fn next_header(
        &self,
        from: usize,
    ) -> usize {
        (from..self.pending.len())
            .find(|&offset| !matches!(self.header_at(offset), Header::Invalid))
            .unwrap_or(self.pending.len())
    }

    /// First offset from `from` holding a whole record that decodes.
    fn next_complete_record(
        &self,
        from: usize,
    ) -> Option<usize> {
        (from..self.pending.len()).find(|&offset| match self.header_at(offset) {
            Header::Frame(len) => self
                .pending
                .get(offset..offset + len)
                .is_some_and(|frame| decode(frame, self.kind).is_ok()),
            Header::Partial | Header::Invalid => false,
        })
    }

    fn header_at(
        &self,
        offset: usize,
    ) -> Header {
        let byte = |index: usize| self.pending.get(offset + index).copied();

        let (Some(lo), Some(hi)) = (byte(0), byte(1)) else {
            return Header::Partial;
        };
        let Some(tag) = RecordTag::from_wire_on(u16::from_le_bytes([lo, hi]), self.kind) else {
            return Header::Invalid;
        };

        let (version_at, frame_len) = match self.kind {
            ChannelKind::Short => (2, tag.min_len()),
            ChannelKind::Long => {
                let (Some(lo), Some(hi)) = (byte(2), byte(3)) else {
                    return Header::Partial;
                };
                let declared = u16::from_le_bytes([lo, hi]) as usize;
                if declared < tag.min_len() {
                    return Header::Invalid;
                }
                (4, declared)
            }
        };

        match (byte(version_at), byte(version_at + 1)) {
            (Some(version), _) if version != WIRE_VERSION => Header::Invalid,
            (_, Some(reserved)) if reserved != 0 => Header::Invalid,
            (Some(_), Some(_)) => Header::Frame(frame_len),
            _ => Header::Partial,
        }
    }
}
