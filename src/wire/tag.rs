use std::fmt;

/// Only record layout version understood by this crate.
pub const WIRE_VERSION: u8 = 1;

/// `tag u16 | version u8 | reserved u8`
pub const SHORT_HEADER_LEN: usize = 4;

/// `tag u16 | length u16 | version u8 | reserved u8`
pub const LONG_HEADER_LEN: usize = 6;

/// Largest total size a long record can declare.
pub const MAX_LONG_RECORD_LEN: usize = u16::MAX as usize;

/// `id u64 | boot_id u32 | machine_id u32 | version u32`
pub const IDENTIFIER_LEN: usize = 20;

// Short payload sizes
const EDGE_PAYLOAD_LEN: usize = 8 + 4 + 4 + IDENTIFIER_LEN * 2 + 8;
const TASK_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 4 * 4 + 8 * 4;
const INODE_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 4 + 4 + 2 + 2 + 8 + 4;
const MSG_QUEUE_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 8;
const SHARED_MEMORY_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 2 + 2;
const SOCKET_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 2 + 2 + 1 + 3;

// Long minimum payload sizes
const STRING_MIN_PAYLOAD_LEN: usize = IDENTIFIER_LEN;
const DISCLOSED_NODE_MIN_PAYLOAD_LEN: usize = IDENTIFIER_LEN;
const ADDRESS_MIN_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 2;
const FILE_NAME_MIN_PAYLOAD_LEN: usize = IDENTIFIER_LEN * 2;
const IFC_CONTEXT_MIN_PAYLOAD_LEN: usize = IDENTIFIER_LEN + 2 + 2;

/// Record class, one per kernel relay channel family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// Fixed-size records
    Short,
    /// Length-prefixed variable records
    Long,
}

impl ChannelKind {
    pub const fn header_len(self) -> usize {
        match self {
            ChannelKind::Short => SHORT_HEADER_LEN,
            ChannelKind::Long => LONG_HEADER_LEN,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Short => "short",
            ChannelKind::Long => "long",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of every record the kernel subsystem emits.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordTag {
    Edge = 1,
    Task = 2,
    Inode = 3,
    String = 4,
    DisclosedNode = 5,
    MsgQueue = 6,
    SharedMemory = 7,
    Socket = 8,
    Address = 9,
    FileName = 10,
    IfcContext = 11,
}

impl RecordTag {
    pub const ALL: [RecordTag; 11] = [
        RecordTag::Edge,
        RecordTag::Task,
        RecordTag::Inode,
        RecordTag::String,
        RecordTag::DisclosedNode,
        RecordTag::MsgQueue,
        RecordTag::SharedMemory,
        RecordTag::Socket,
        RecordTag::Address,
        RecordTag::FileName,
        RecordTag::IfcContext,
    ];

    pub const fn wire_value(self) -> u16 {
        self as u16
    }

    pub fn from_wire(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|tag| tag.wire_value() == value)
    }

    /// Tag lookup restricted to the records a given channel may carry.
    pub fn from_wire_on(
        value: u16,
        channel: ChannelKind,
    ) -> Option<Self> {
        Self::from_wire(value).filter(|tag| tag.channel() == channel)
    }

    pub const fn channel(self) -> ChannelKind {
        match self {
            RecordTag::Edge
            | RecordTag::Task
            | RecordTag::Inode
            | RecordTag::MsgQueue
            | RecordTag::SharedMemory
            | RecordTag::Socket => ChannelKind::Short,
            RecordTag::String
            | RecordTag::DisclosedNode
            | RecordTag::Address
            | RecordTag::FileName
            | RecordTag::IfcContext => ChannelKind::Long,
        }
    }

    /// Total size of a short record, or the smallest total size a long record
    /// of this tag may declare.
    pub const fn min_len(self) -> usize {
        let payload = match self {
            RecordTag::Edge => EDGE_PAYLOAD_LEN,
            RecordTag::Task => TASK_PAYLOAD_LEN,
            RecordTag::Inode => INODE_PAYLOAD_LEN,
            RecordTag::MsgQueue => MSG_QUEUE_PAYLOAD_LEN,
            RecordTag::SharedMemory => SHARED_MEMORY_PAYLOAD_LEN,
            RecordTag::Socket => SOCKET_PAYLOAD_LEN,
            RecordTag::String => STRING_MIN_PAYLOAD_LEN,
            RecordTag::DisclosedNode => DISCLOSED_NODE_MIN_PAYLOAD_LEN,
            RecordTag::Address => ADDRESS_MIN_PAYLOAD_LEN,
            RecordTag::FileName => FILE_NAME_MIN_PAYLOAD_LEN,
            RecordTag::IfcContext => IFC_CONTEXT_MIN_PAYLOAD_LEN,
        };
        self.channel().header_len() + payload
    }

    /// Fixed total size for short-channel tags.
    pub const fn fixed_len(self) -> Option<usize> {
        match self.channel() {
            ChannelKind::Short => Some(self.min_len()),
            ChannelKind::Long => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            RecordTag::Edge => "edge",
            RecordTag::Task => "task",
            RecordTag::Inode => "inode",
            RecordTag::String => "string",
            RecordTag::DisclosedNode => "disclosed_node",
            RecordTag::MsgQueue => "msg_queue",
            RecordTag::SharedMemory => "shared_memory",
            RecordTag::Socket => "socket",
            RecordTag::Address => "address",
            RecordTag::FileName => "file_name",
            RecordTag::IfcContext => "ifc_context",
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}
