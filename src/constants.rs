// -
// Kernel endpoints

/// Default directory of the provenance control files
pub(crate) const DEFAULT_SECURITYFS_DIR: &str = "/sys/kernel/security/provenance";

/// Default directory of the per-CPU relay files
pub(crate) const DEFAULT_RELAY_DIR: &str = "/sys/kernel/debug";

pub(crate) const DEFAULT_SHORT_CHANNEL_PREFIX: &str = "provenance";
pub(crate) const DEFAULT_LONG_CHANNEL_PREFIX: &str = "long_provenance";

// -
// Control file names

pub(crate) const ENABLE_FILE: &str = "enable";
pub(crate) const ALL_FILE: &str = "all";
pub(crate) const OPAQUE_FILE: &str = "opaque";
pub(crate) const TRACKED_FILE: &str = "tracked";
pub(crate) const NODE_FILTER_FILE: &str = "node_filter";
pub(crate) const EDGE_FILTER_FILE: &str = "edge_filter";
pub(crate) const MACHINE_ID_FILE: &str = "machine_id";
pub(crate) const DISCLOSE_NODE_FILE: &str = "disclose_node";
pub(crate) const DISCLOSE_EDGE_FILE: &str = "disclose_edge";
pub(crate) const SELF_FILE: &str = "self";

/// Operation codes carried by a filter update write
pub(crate) const FILTER_OP_ADD: u32 = 1;
pub(crate) const FILTER_OP_REMOVE: u32 = 2;
