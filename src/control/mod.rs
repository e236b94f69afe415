//! Kernel control plane.
//!
//! [`ControlChannel`] is the seam between the [`crate::Provenance`] façade and
//! whatever exposes the capture subsystem's switches: the securityfs files of
//! a real kernel ([`SecurityFsControl`]) or the in-process
//! [`crate::SimulatedKernel`].
mod securityfs;
pub use securityfs::*;


#[cfg(test)]
use mockall::automock;

use crate::constants::ALL_FILE;
use crate::constants::DISCLOSE_EDGE_FILE;
use crate::constants::DISCLOSE_NODE_FILE;
use crate::constants::EDGE_FILTER_FILE;
use crate::constants::ENABLE_FILE;
use crate::constants::FILTER_OP_ADD;
use crate::constants::FILTER_OP_REMOVE;
use crate::constants::MACHINE_ID_FILE;
use crate::constants::NODE_FILTER_FILE;
use crate::constants::OPAQUE_FILE;
use crate::constants::TRACKED_FILE;
use crate::filter::FilterTarget;
use crate::Result;

/// Boolean switches of the capture subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Global capture on/off
    Enable,
    /// Capture every process, not only tracked ones
    CaptureAll,
    /// Hide the calling process from the graph
    Opaque,
    /// Track the calling process
    Tracked,
}

impl Flag {
    pub const fn endpoint(self) -> &'static str {
        match self {
            Flag::Enable => ENABLE_FILE,
            Flag::CaptureAll => ALL_FILE,
            Flag::Opaque => OPAQUE_FILE,
            Flag::Tracked => TRACKED_FILE,
        }
    }

    pub const fn set_operation(self) -> &'static str {
        match self {
            Flag::Enable => "set_enable",
            Flag::CaptureAll => "set_all",
            Flag::Opaque => "set_opaque",
            Flag::Tracked => "set_tracked",
        }
    }

    pub const fn get_operation(self) -> &'static str {
        match self {
            Flag::Enable => "get_enable",
            Flag::CaptureAll => "get_all",
            Flag::Opaque => "get_opaque",
            Flag::Tracked => "get_tracked",
        }
    }
}

/// 32-bit values held by the capture subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Word {
    NodeFilter,
    EdgeFilter,
    MachineId,
}

impl Word {
    pub const fn endpoint(self) -> &'static str {
        match self {
            Word::NodeFilter => NODE_FILTER_FILE,
            Word::EdgeFilter => EDGE_FILTER_FILE,
            Word::MachineId => MACHINE_ID_FILE,
        }
    }

    pub const fn set_operation(self) -> &'static str {
        match self {
            Word::NodeFilter => "set_node_filter",
            Word::EdgeFilter => "set_edge_filter",
            Word::MachineId => "set_machine_id",
        }
    }

    pub const fn get_operation(self) -> &'static str {
        match self {
            Word::NodeFilter => "get_node_filter",
            Word::EdgeFilter => "get_edge_filter",
            Word::MachineId => "get_machine_id",
        }
    }

    pub const fn for_filter(target: FilterTarget) -> Self {
        match target {
            FilterTarget::Node => Word::NodeFilter,
            FilterTarget::Edge => Word::EdgeFilter,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    Add,
    Remove,
}

impl FilterOp {
    pub const fn wire_value(self) -> u32 {
        match self {
            FilterOp::Add => FILTER_OP_ADD,
            FilterOp::Remove => FILTER_OP_REMOVE,
        }
    }

    pub const fn operation(
        self,
        target: FilterTarget,
    ) -> &'static str {
        match (self, target) {
            (FilterOp::Add, FilterTarget::Node) => "add_node_filter",
            (FilterOp::Remove, FilterTarget::Node) => "remove_node_filter",
            (FilterOp::Add, FilterTarget::Edge) => "add_edge_filter",
            (FilterOp::Remove, FilterTarget::Edge) => "remove_edge_filter",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisclosureKind {
    Node,
    Edge,
}

impl DisclosureKind {
    pub const fn endpoint(self) -> &'static str {
        match self {
            DisclosureKind::Node => DISCLOSE_NODE_FILE,
            DisclosureKind::Edge => DISCLOSE_EDGE_FILE,
        }
    }

    pub const fn operation(self) -> &'static str {
        match self {
            DisclosureKind::Node => "disclose_node",
            DisclosureKind::Edge => "disclose_edge",
        }
    }
}

/// Synchronous request/response access to the kernel's control endpoints.
///
/// Implementations report a missing subsystem as [`crate::Error::SubsystemAbsent`]
/// and a refused privileged call as [`crate::Error::PermissionDenied`].
#[cfg_attr(test, automock)]
pub trait ControlChannel: Send + Sync + 'static {
    /// Whether the capture subsystem is loaded. Never fails.
    fn probe(&self) -> bool;

    fn get_flag(
        &self,
        flag: Flag,
    ) -> Result<bool>;

    fn set_flag(
        &self,
        flag: Flag,
        value: bool,
    ) -> Result<()>;

    fn get_u32(
        &self,
        word: Word,
    ) -> Result<u32>;

    fn set_u32(
        &self,
        word: Word,
        value: u32,
    ) -> Result<()>;

    /// Adds or removes `mask` bits from the kernel's node or edge filter.
    fn update_filter(
        &self,
        target: FilterTarget,
        op: FilterOp,
        mask: u32,
    ) -> Result<()>;

    /// Submits an encoded disclosed node or edge record.
    fn submit_disclosure(
        &self,
        kind: DisclosureKind,
        payload: &[u8],
    ) -> Result<()>;

    /// Raw bytes of the calling process's own task record.
    fn read_self(&self) -> Result<Vec<u8>>;
}
