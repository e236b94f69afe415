use super::AddressRecord;
use super::ChannelKind;
use super::DisclosedNodeRecord;
use super::EdgeRecord;
use super::FileNameRecord;
use super::IfcContextRecord;
use super::InodeRecord;
use super::MsgQueueRecord;
use super::NodeIdentifier;
use super::Record;
use super::RecordTag;
use super::SharedMemoryRecord;
use super::SocketRecord;
use super::StringRecord;
use super::TaskRecord;
use super::LONG_HEADER_LEN;
use super::MAX_LONG_RECORD_LEN;
use super::SHORT_HEADER_LEN;
use super::WIRE_VERSION;
use crate::filter::EdgeType;
use crate::DecodeError;
use crate::Error;
use crate::Result;

/// Decodes one framed record received on `channel`.
///
/// The buffer must hold exactly one record: short records must match their
/// tag's fixed size and long records their declared length. All fields are
/// copied out, the returned [`Record`] holds no reference into `bytes`.
///
/// # Errors
/// - [`DecodeError::TruncatedBuffer`] when the buffer is shorter than the header or the record
/// - [`DecodeError::UnknownTag`] when the tag is not a record of this channel
/// - [`DecodeError::UnsupportedVersion`] for any version other than [`WIRE_VERSION`]
/// - [`DecodeError::LengthMismatch`] when sizes disagree
/// - [`DecodeError::InvalidField`] for out-of-range field values, a non-zero
///   reserved byte or string text that is not UTF-8
pub fn decode(
    bytes: &[u8],
    channel: ChannelKind,
) -> std::result::Result<Record, DecodeError> {
    let header_len = channel.header_len();
    if bytes.len() < header_len {
        return Err(DecodeError::TruncatedBuffer {
            needed: header_len,
            available: bytes.len(),
        });
    }

    let raw_tag = u16::from_le_bytes([bytes[0], bytes[1]]);
    let tag = RecordTag::from_wire_on(raw_tag, channel).ok_or(DecodeError::UnknownTag {
        tag: raw_tag,
        channel,
    })?;

    let version = match channel {
        ChannelKind::Short => bytes[2],
        ChannelKind::Long => bytes[4],
    };
    if version != WIRE_VERSION {
        return Err(DecodeError::UnsupportedVersion { version });
    }
    let reserved = bytes[header_len - 1];
    if reserved != 0 {
        return Err(DecodeError::InvalidField {
            field: "reserved",
            value: reserved as u64,
        });
    }

    let payload = match channel {
        ChannelKind::Short => {
            let expected = tag.min_len();
            if bytes.len() < expected {
                return Err(DecodeError::TruncatedBuffer {
                    needed: expected,
                    available: bytes.len(),
                });
            }
            if bytes.len() > expected {
                return Err(DecodeError::LengthMismatch {
                    tag: raw_tag,
                    expected,
                    actual: bytes.len(),
                });
            }
            &bytes[SHORT_HEADER_LEN..]
        }
        ChannelKind::Long => {
            let declared = u16::from_le_bytes([bytes[2], bytes[3]]) as usize;
            if declared < tag.min_len() {
                return Err(DecodeError::LengthMismatch {
                    tag: raw_tag,
                    expected: tag.min_len(),
                    actual: declared,
                });
            }
            if declared > bytes.len() {
                return Err(DecodeError::TruncatedBuffer {
                    needed: declared,
                    available: bytes.len(),
                });
            }
            if declared != bytes.len() {
                return Err(DecodeError::LengthMismatch {
                    tag: raw_tag,
                    expected: declared,
                    actual: bytes.len(),
                });
            }
            &bytes[LONG_HEADER_LEN..]
        }
    };

    let mut reader = Reader::new(payload);
    let record = match tag {
        RecordTag::Edge => Record::Edge(read_edge(&mut reader)?),
        RecordTag::Task => Record::Task(read_task(&mut reader)?),
        RecordTag::Inode => {
            let identifier = reader.identifier()?;
            let uid = reader.u32()?;
            let gid = reader.u32()?;
            let mode = reader.u16()?;
            reader.skip(2)?;
            Record::Inode(InodeRecord {
                identifier,
                uid,
                gid,
                mode,
                ino: reader.u64()?,
                secid: reader.u32()?,
            })
        }
        RecordTag::MsgQueue => Record::MsgQueue(MsgQueueRecord {
            identifier: reader.identifier()?,
            msg_type: reader.u64()?,
        }),
        RecordTag::SharedMemory => {
            let identifier = reader.identifier()?;
            let mode = reader.u16()?;
            reader.skip(2)?;
            Record::SharedMemory(SharedMemoryRecord { identifier, mode })
        }
        RecordTag::Socket => {
            let identifier = reader.identifier()?;
            let sock_type = reader.u16()?;
            let family = reader.u16()?;
            let protocol = reader.u8()?;
            reader.skip(3)?;
            Record::Socket(SocketRecord {
                identifier,
                sock_type,
                family,
                protocol,
            })
        }
        RecordTag::String => {
            let identifier = reader.identifier()?;
            let text = std::str::from_utf8(reader.rest()).map_err(|e| DecodeError::InvalidField {
                field: "text",
                value: e.valid_up_to() as u64,
            })?;
            Record::String(StringRecord {
                identifier,
                text: text.to_owned(),
            })
        }
        RecordTag::DisclosedNode => Record::DisclosedNode(DisclosedNodeRecord {
            identifier: reader.identifier()?,
            content: reader.rest().to_vec(),
        }),
        RecordTag::Address => Record::Address(AddressRecord {
            identifier: reader.identifier()?,
            family: reader.u16()?,
            address: reader.rest().to_vec(),
        }),
        RecordTag::FileName => Record::FileName(FileNameRecord {
            identifier: reader.identifier()?,
            inode: reader.identifier()?,
            name: reader.rest().to_vec(),
        }),
        RecordTag::IfcContext => Record::IfcContext(read_ifc(&mut reader, raw_tag, bytes.len())?),
    };

    Ok(record)
}

/// Serialises a record into its channel's wire layout.
///
/// # Errors
/// Returns [`Error::PayloadTooLarge`] when a long record does not fit the
/// 16-bit length field.
pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let tag = record.tag();
    let mut payload = Writer::with_capacity(tag.min_len());

    match record {
        Record::Edge(edge) => {
            payload.u64(edge.id);
            payload.u32(edge.relation.bit());
            payload.u8(edge.allowed as u8);
            payload.zeros(3);
            payload.identifier(&edge.source);
            payload.identifier(&edge.destination);
            payload.u64(edge.jiffies);
        }
        Record::Task(task) => {
            payload.identifier(&task.identifier);
            payload.u32(task.uid);
            payload.u32(task.gid);
            payload.u32(task.pid);
            payload.u32(task.vpid);
            payload.u64(task.utime);
            payload.u64(task.stime);
            payload.u64(task.vm);
            payload.u64(task.rss);
        }
        Record::Inode(inode) => {
            payload.identifier(&inode.identifier);
            payload.u32(inode.uid);
            payload.u32(inode.gid);
            payload.u16(inode.mode);
            payload.zeros(2);
            payload.u64(inode.ino);
            payload.u32(inode.secid);
        }
        Record::MsgQueue(msg) => {
            payload.identifier(&msg.identifier);
            payload.u64(msg.msg_type);
        }
        Record::SharedMemory(shm) => {
            payload.identifier(&shm.identifier);
            payload.u16(shm.mode);
            payload.zeros(2);
        }
        Record::Socket(sock) => {
            payload.identifier(&sock.identifier);
            payload.u16(sock.sock_type);
            payload.u16(sock.family);
            payload.u8(sock.protocol);
            payload.zeros(3);
        }
        Record::String(string) => {
            payload.identifier(&string.identifier);
            payload.bytes(string.text.as_bytes());
        }
        Record::DisclosedNode(node) => {
            payload.identifier(&node.identifier);
            payload.bytes(&node.content);
        }
        Record::Address(address) => {
            payload.identifier(&address.identifier);
            payload.u16(address.family);
            payload.bytes(&address.address);
        }
        Record::FileName(file_name) => {
            payload.identifier(&file_name.identifier);
            payload.identifier(&file_name.inode);
            payload.bytes(&file_name.name);
        }
        Record::IfcContext(ifc) => {
            payload.identifier(&ifc.identifier);
            payload.u16(label_count(ifc.secrecy.len())?);
            payload.u16(label_count(ifc.integrity.len())?);
            for label in ifc.secrecy.iter().chain(ifc.integrity.iter()) {
                payload.u64(*label);
            }
        }
    }

    let payload = payload.into_inner();
    let mut out = Writer::with_capacity(tag.channel().header_len() + payload.len());
    out.u16(tag.wire_value());
    match tag.channel() {
        ChannelKind::Short => {
            debug_assert_eq!(SHORT_HEADER_LEN + payload.len(), tag.min_len());
        }
        ChannelKind::Long => {
            let total = LONG_HEADER_LEN + payload.len();
            if total > MAX_LONG_RECORD_LEN {
                return Err(Error::PayloadTooLarge {
                    len: payload.len(),
                    max: MAX_LONG_RECORD_LEN - LONG_HEADER_LEN,
                });
            }
            out.u16(total as u16);
        }
    }
    out.u8(WIRE_VERSION);
    out.u8(0);
    out.bytes(&payload);

    Ok(out.into_inner())
}

fn label_count(len: usize) -> Result<u16> {
    u16::try_from(len).map_err(|_| Error::PayloadTooLarge {
        len: len * 8,
        max: MAX_LONG_RECORD_LEN - LONG_HEADER_LEN,
    })
}

fn read_edge(reader: &mut Reader<'_>) -> std::result::Result<EdgeRecord, DecodeError> {
    let id = reader.u64()?;
    let raw_relation = reader.u32()?;
    let relation = EdgeType::from_wire(raw_relation).ok_or(DecodeError::InvalidField {
        field: "relation",
        value: raw_relation as u64,
    })?;
    let allowed = reader.u8()? != 0;
    reader.skip(3)?;
    Ok(EdgeRecord {
        id,
        relation,
        allowed,
        source: reader.identifier()?,
        destination: reader.identifier()?,
        jiffies: reader.u64()?,
    })
}

fn read_task(reader: &mut Reader<'_>) -> std::result::Result<TaskRecord, DecodeError> {
    Ok(TaskRecord {
        identifier: reader.identifier()?,
        uid: reader.u32()?,
        gid: reader.u32()?,
        pid: reader.u32()?,
        vpid: reader.u32()?,
        utime: reader.u64()?,
        stime: reader.u64()?,
        vm: reader.u64()?,
        rss: reader.u64()?,
    })
}

fn read_ifc(
    reader: &mut Reader<'_>,
    raw_tag: u16,
    total_len: usize,
) -> std::result::Result<IfcContextRecord, DecodeError> {
    let identifier = reader.identifier()?;
    let secrecy_count = reader.u16()? as usize;
    let integrity_count = reader.u16()? as usize;

    let labels_len = (secrecy_count + integrity_count) * 8;
    if reader.remaining() != labels_len {
        return Err(DecodeError::LengthMismatch {
            tag: raw_tag,
            expected: RecordTag::IfcContext.min_len() + labels_len,
            actual: total_len,
        });
    }

    let mut secrecy = Vec::with_capacity(secrecy_count);
    for _ in 0..secrecy_count {
        secrecy.push(reader.u64()?);
    }
    let mut integrity = Vec::with_capacity(integrity_count);
    for _ in 0..integrity_count {
        integrity.push(reader.u64()?);
    }

    Ok(IfcContextRecord {
        identifier,
        secrecy,
        integrity,
    })
}

/// Bounds-checked little-endian cursor over a record payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(
        &mut self,
        len: usize,
    ) -> std::result::Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::TruncatedBuffer {
                needed: self.pos + len,
                available: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn skip(
        &mut self,
        len: usize,
    ) -> std::result::Result<(), DecodeError> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> std::result::Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> std::result::Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> std::result::Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> std::result::Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn identifier(&mut self) -> std::result::Result<NodeIdentifier, DecodeError> {
        Ok(NodeIdentifier {
            id: self.u64()?,
            boot_id: self.u32()?,
            machine_id: self.u32()?,
            version: self.u32()?,
        })
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    fn u8(
        &mut self,
        value: u8,
    ) {
        self.0.push(value);
    }

    fn u16(
        &mut self,
        value: u16,
    ) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(
        &mut self,
        value: u32,
    ) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(
        &mut self,
        value: u64,
    ) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn zeros(
        &mut self,
        len: usize,
    ) {
        self.0.resize(self.0.len() + len, 0);
    }

    fn bytes(
        &mut self,
        bytes: &[u8],
    ) {
        self.0.extend_from_slice(bytes);
    }

    fn identifier(
        &mut self,
        identifier: &NodeIdentifier,
    ) {
        self.u64(identifier.id);
        self.u32(identifier.boot_id);
        self.u32(identifier.machine_id);
        self.u32(identifier.version);
    }

    fn into_inner(self) -> Vec<u8> {
        self.0
    }
}
