use std::borrow::Cow;

use super::ChannelKind;
use super::RecordTag;
use crate::filter::EdgeType;
use crate::filter::FilterClass;
use crate::filter::NodeType;

/// Identity of a provenance graph node as assigned by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeIdentifier {
    pub id: u64,
    pub boot_id: u32,
    pub machine_id: u32,
    pub version: u32,
}

impl NodeIdentifier {
    /// Sentinel for fields the kernel fills in on disclosure.
    pub const BLANK: NodeIdentifier = NodeIdentifier {
        id: 0,
        boot_id: 0,
        machine_id: 0,
        version: 0,
    };

    pub fn is_blank(&self) -> bool {
        *self == Self::BLANK
    }
}

/// Relation between two graph nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Kernel-assigned relation id
    pub id: u64,
    pub relation: EdgeType,
    /// Whether the operation was permitted by the security policy
    pub allowed: bool,
    pub source: NodeIdentifier,
    pub destination: NodeIdentifier,
    /// Kernel-assigned timestamp
    pub jiffies: u64,
}

impl EdgeRecord {
    /// Edge ready for disclosure; `id` and `jiffies` are left blank.
    pub fn disclosed(
        relation: EdgeType,
        source: NodeIdentifier,
        destination: NodeIdentifier,
    ) -> Self {
        Self {
            id: 0,
            relation,
            allowed: true,
            source,
            destination,
            jiffies: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecord {
    pub identifier: NodeIdentifier,
    pub uid: u32,
    pub gid: u32,
    pub pid: u32,
    pub vpid: u32,
    pub utime: u64,
    pub stime: u64,
    pub vm: u64,
    pub rss: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeRecord {
    pub identifier: NodeIdentifier,
    pub uid: u32,
    pub gid: u32,
    pub mode: u16,
    pub ino: u64,
    pub secid: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgQueueRecord {
    pub identifier: NodeIdentifier,
    pub msg_type: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedMemoryRecord {
    pub identifier: NodeIdentifier,
    pub mode: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketRecord {
    pub identifier: NodeIdentifier,
    pub sock_type: u16,
    pub family: u16,
    pub protocol: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRecord {
    pub identifier: NodeIdentifier,
    /// Kernel log text, always valid UTF-8 once decoded
    pub text: String,
}

/// Application-disclosed node carrying opaque content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisclosedNodeRecord {
    pub identifier: NodeIdentifier,
    pub content: Vec<u8>,
}

impl DisclosedNodeRecord {
    /// Node ready for disclosure; the identifier is left blank.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            identifier: NodeIdentifier::BLANK,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRecord {
    pub identifier: NodeIdentifier,
    pub family: u16,
    /// Raw socket address bytes following the family field
    pub address: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameRecord {
    pub identifier: NodeIdentifier,
    /// Inode the name was resolved for
    pub inode: NodeIdentifier,
    /// Path bytes exactly as the kernel resolved them, not necessarily UTF-8
    pub name: Vec<u8>,
}

impl FileNameRecord {
    /// Display form of the path; invalid UTF-8 becomes U+FFFD.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

/// Information flow control labels attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfcContextRecord {
    pub identifier: NodeIdentifier,
    pub secrecy: Vec<u64>,
    pub integrity: Vec<u64>,
}

/// Closed set of decoded records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Edge(EdgeRecord),
    Task(TaskRecord),
    Inode(InodeRecord),
    String(StringRecord),
    DisclosedNode(DisclosedNodeRecord),
    MsgQueue(MsgQueueRecord),
    SharedMemory(SharedMemoryRecord),
    Socket(SocketRecord),
    Address(AddressRecord),
    FileName(FileNameRecord),
    IfcContext(IfcContextRecord),
}

impl Record {
    pub fn tag(&self) -> RecordTag {
        match self {
            Record::Edge(_) => RecordTag::Edge,
            Record::Task(_) => RecordTag::Task,
            Record::Inode(_) => RecordTag::Inode,
            Record::String(_) => RecordTag::String,
            Record::DisclosedNode(_) => RecordTag::DisclosedNode,
            Record::MsgQueue(_) => RecordTag::MsgQueue,
            Record::SharedMemory(_) => RecordTag::SharedMemory,
            Record::Socket(_) => RecordTag::Socket,
            Record::Address(_) => RecordTag::Address,
            Record::FileName(_) => RecordTag::FileName,
            Record::IfcContext(_) => RecordTag::IfcContext,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.tag().channel()
    }

    pub fn filter_class(&self) -> FilterClass {
        let node = match self {
            Record::Edge(edge) => return FilterClass::Edge(edge.relation),
            Record::Task(_) => NodeType::Task,
            Record::Inode(_) => NodeType::Inode,
            Record::String(_) => NodeType::String,
            Record::DisclosedNode(_) => NodeType::DisclosedNode,
            Record::MsgQueue(_) => NodeType::MsgQueue,
            Record::SharedMemory(_) => NodeType::SharedMemory,
            Record::Socket(_) => NodeType::Socket,
            Record::Address(_) => NodeType::Address,
            Record::FileName(_) => NodeType::FileName,
            Record::IfcContext(_) => NodeType::IfcContext,
        };
        FilterClass::Node(node)
    }
}
