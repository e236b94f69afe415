//! Node/edge type bitmasks and the local filtering policy consulted by the
//! relay before a record reaches an application handler.
//!
//! Bit positions are fixed here once and shared by the decoder (edge
//! relations travel as their bit index) and the control plane (masks written
//! to the kernel use the same layout).

mod policy;

pub use policy::*;


use std::fmt;
use std::ops::BitOr;

/// Node-shaped record types, one filter bit each.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Task = 0,
    Inode = 1,
    MsgQueue = 2,
    SharedMemory = 3,
    Socket = 4,
    String = 5,
    DisclosedNode = 6,
    Address = 7,
    FileName = 8,
    IfcContext = 9,
}

impl NodeType {
    /// Every bit a node filter may carry.
    pub const ALL_BITS: u32 = 0x3FF;

    pub const fn bit(self) -> u32 {
        self as u32
    }

    pub const fn mask(self) -> FilterMask {
        FilterMask(1 << self.bit())
    }
}

/// Relation carried by an edge record. The discriminant is both the wire
/// value of the `relation` field and the bit position in the edge filter.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeType {
    Read = 0,
    Write = 1,
    Exec = 2,
    Clone = 3,
    Version = 4,
    Named = 5,
    Open = 6,
    Create = 7,
    Send = 8,
    Receive = 9,
    Connect = 10,
    Bind = 11,
    Listen = 12,
    Accept = 13,
    Mmap = 14,
    Disclosed = 15,
}

impl EdgeType {
    pub const ALL_BITS: u32 = 0xFFFF;

    const ALL: [EdgeType; 16] = [
        EdgeType::Read,
        EdgeType::Write,
        EdgeType::Exec,
        EdgeType::Clone,
        EdgeType::Version,
        EdgeType::Named,
        EdgeType::Open,
        EdgeType::Create,
        EdgeType::Send,
        EdgeType::Receive,
        EdgeType::Connect,
        EdgeType::Bind,
        EdgeType::Listen,
        EdgeType::Accept,
        EdgeType::Mmap,
        EdgeType::Disclosed,
    ];

    pub const fn bit(self) -> u32 {
        self as u32
    }

    pub const fn mask(self) -> FilterMask {
        FilterMask(1 << self.bit())
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

/// Which of the two kernel filters a mask applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTarget {
    Node,
    Edge,
}

impl FilterTarget {
    pub const fn allowed_bits(self) -> u32 {
        match self {
            FilterTarget::Node => NodeType::ALL_BITS,
            FilterTarget::Edge => EdgeType::ALL_BITS,
        }
    }
}

/// Filter classification of a decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterClass {
    Node(NodeType),
    Edge(EdgeType),
}

/// A set bit means "excluded from capture/dispatch".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FilterMask(u32);

impl FilterMask {
    pub const fn from_bits(bits: u32) -> Self {
        FilterMask(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(
        self,
        other: FilterMask,
    ) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for FilterMask {
    type Output = FilterMask;

    fn bitor(
        self,
        rhs: FilterMask,
    ) -> FilterMask {
        FilterMask(self.0 | rhs.0)
    }
}

impl From<u32> for FilterMask {
    fn from(bits: u32) -> Self {
        FilterMask(bits)
    }
}

impl From<NodeType> for FilterMask {
    fn from(node: NodeType) -> Self {
        node.mask()
    }
}

impl From<EdgeType> for FilterMask {
    fn from(edge: EdgeType) -> Self {
        edge.mask()
    }
}

impl fmt::Debug for FilterMask {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "FilterMask({:#x})", self.0)
    }
}
