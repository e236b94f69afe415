//! Public entry point.
//!
//! [`Provenance`] ties the control plane, the local filter policy and the
//! relay registry together:
//!
//! ```ignore
//! let provenance = Provenance::builder().build()?;
//! provenance.add_node_filter(NodeType::Inode)?;
//! provenance.register(ProvenanceOps::new().on_task(|task| {
//!     tracing::info!(pid = task.pid, "task observed");
//!     Ok(())
//! }))?;
//! provenance.set_enable(true)?;
//! // ...
//! provenance.stop().await?;
//! ```
mod builder;
pub use builder::*;


use std::sync::Arc;

use tracing::debug;

use crate::control::ControlChannel;
use crate::control::DisclosureKind;
use crate::control::FilterOp;
use crate::control::Flag;
use crate::control::Word;
use crate::dispatch::DispatchOutcome;
use crate::dispatch::ProvenanceOps;
use crate::filter::FilterMask;
use crate::filter::FilterPolicy;
use crate::filter::FilterTarget;
use crate::registry::ChannelInfo;
use crate::registry::LifecycleState;
use crate::registry::Registry;
use crate::wire::decode;
use crate::wire::encode;
use crate::wire::ChannelKind;
use crate::wire::DisclosedNodeRecord;
use crate::wire::EdgeRecord;
use crate::wire::NodeIdentifier;
use crate::wire::Record;
use crate::wire::TaskRecord;
use crate::DecodeError;
use crate::Error;
use crate::ProvenanceConfig;
use crate::RelayStats;
use crate::RelayStatsSnapshot;
use crate::Result;

pub struct Provenance {
    config: ProvenanceConfig,
    control: Arc<dyn ControlChannel>,
    policy: Arc<FilterPolicy>,
    stats: Arc<RelayStats>,
    registry: Registry,
}

impl Provenance {
    pub fn builder() -> ProvenanceBuilder {
        ProvenanceBuilder::new()
    }

    /// Kernel-backed instance configured from `CONFIG_PATH` and the environment.
    pub fn new() -> Result<Self> {
        ProvenanceBuilder::new().build()
    }

    pub fn config(&self) -> &ProvenanceConfig {
        &self.config
    }

    /// Whether the kernel capture subsystem is available. Never fails.
    pub fn is_present(&self) -> bool {
        self.control.probe()
    }

    /// Starts relaying records to `ops`. Must be called within a Tokio runtime.
    ///
    /// # Errors
    /// - `Error::AlreadyRegistered` while a registration is active
    /// - `Error::SubsystemAbsent` when the kernel subsystem is missing
    pub fn register(
        &self,
        ops: ProvenanceOps,
    ) -> Result<()> {
        self.registry.register(ops)
    }

    /// Stops relaying. No-op when not registered.
    pub async fn stop(&self) -> Result<()> {
        self.registry.stop().await
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.registry.lifecycle()
    }

    pub fn active_channels(&self) -> Result<Vec<ChannelInfo>> {
        self.registry.active_channels()
    }

    /// Pushes `record` through the active registration as if it had arrived
    /// on a relay channel: filter masks, class predicate, then its handler.
    /// Runs on the calling thread.
    ///
    /// # Errors
    /// `Error::NotRegistered` unless a registration is active.
    pub fn record(
        &self,
        record: Record,
    ) -> Result<DispatchOutcome> {
        let dispatcher = self.registry.dispatcher()?;
        Ok(dispatcher.dispatch(record))
    }

    /// Decodes one raw record of a `kind` channel and dispatches it like
    /// [`Provenance::record`]. Rejected bytes count as decode errors.
    ///
    /// # Errors
    /// - `Error::NotRegistered` unless a registration is active
    /// - `Error::Decode` when `bytes` is not one valid record for `kind`
    pub fn record_raw(
        &self,
        bytes: &[u8],
        kind: ChannelKind,
    ) -> Result<DispatchOutcome> {
        let dispatcher = self.registry.dispatcher()?;
        match decode(bytes, kind) {
            Ok(record) => Ok(dispatcher.dispatch(record)),
            Err(e) => {
                debug!(%kind, error = %e, "rejecting raw record");
                self.stats.record_decode_error(e.kind());
                Err(e.into())
            }
        }
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Local masks consulted by the relay before dispatch.
    pub fn filter_policy(&self) -> &FilterPolicy {
        &self.policy
    }

    // -
    // Flags

    pub fn set_enable(
        &self,
        value: bool,
    ) -> Result<()> {
        self.set_flag(Flag::Enable, value)
    }

    pub fn get_enable(&self) -> Result<bool> {
        self.control()?.get_flag(Flag::Enable)
    }

    /// Capture every process rather than only tracked ones.
    pub fn set_all(
        &self,
        value: bool,
    ) -> Result<()> {
        self.set_flag(Flag::CaptureAll, value)
    }

    pub fn get_all(&self) -> Result<bool> {
        self.control()?.get_flag(Flag::CaptureAll)
    }

    /// Hides the calling process from the provenance graph.
    pub fn set_opaque(
        &self,
        value: bool,
    ) -> Result<()> {
        self.set_flag(Flag::Opaque, value)
    }

    pub fn set_tracked(
        &self,
        value: bool,
    ) -> Result<()> {
        self.set_flag(Flag::Tracked, value)
    }

    fn set_flag(
        &self,
        flag: Flag,
        value: bool,
    ) -> Result<()> {
        self.control()?.set_flag(flag, value)?;
        debug!(?flag, value, "flag updated");
        Ok(())
    }

    // -
    // Filters

    /// Node filter as held by the kernel.
    pub fn get_node_filter(&self) -> Result<FilterMask> {
        self.get_filter(FilterTarget::Node)
    }

    pub fn add_node_filter(
        &self,
        mask: impl Into<FilterMask>,
    ) -> Result<()> {
        self.update_filter(FilterTarget::Node, FilterOp::Add, mask.into())
    }

    pub fn remove_node_filter(
        &self,
        mask: impl Into<FilterMask>,
    ) -> Result<()> {
        self.update_filter(FilterTarget::Node, FilterOp::Remove, mask.into())
    }

    /// Edge filter as held by the kernel.
    pub fn get_edge_filter(&self) -> Result<FilterMask> {
        self.get_filter(FilterTarget::Edge)
    }

    pub fn add_edge_filter(
        &self,
        mask: impl Into<FilterMask>,
    ) -> Result<()> {
        self.update_filter(FilterTarget::Edge, FilterOp::Add, mask.into())
    }

    pub fn remove_edge_filter(
        &self,
        mask: impl Into<FilterMask>,
    ) -> Result<()> {
        self.update_filter(FilterTarget::Edge, FilterOp::Remove, mask.into())
    }

    fn get_filter(
        &self,
        target: FilterTarget,
    ) -> Result<FilterMask> {
        let bits = self.control()?.get_u32(Word::for_filter(target))?;
        Ok(FilterMask::from_bits(bits))
    }

    /// Kernel first; the local policy mirrors the change only on success.
    fn update_filter(
        &self,
        target: FilterTarget,
        op: FilterOp,
        mask: FilterMask,
    ) -> Result<()> {
        FilterPolicy::validate(target, mask)?;
        self.control()?.update_filter(target, op, mask.bits())?;

        match (target, op) {
            (FilterTarget::Node, FilterOp::Add) => self.policy.add_node_filter(mask),
            (FilterTarget::Node, FilterOp::Remove) => self.policy.remove_node_filter(mask),
            (FilterTarget::Edge, FilterOp::Add) => self.policy.add_edge_filter(mask),
            (FilterTarget::Edge, FilterOp::Remove) => self.policy.remove_edge_filter(mask),
        }
    }

    // -
    // Machine identity

    pub fn set_machine_id(
        &self,
        machine_id: u32,
    ) -> Result<()> {
        self.control()?.set_u32(Word::MachineId, machine_id)
    }

    /// Always read from the kernel.
    pub fn get_machine_id(&self) -> Result<u32> {
        self.control()?.get_u32(Word::MachineId)
    }

    // -
    // Disclosure

    /// Injects an application node into the graph. The kernel assigns its
    /// identifier; any identifier set by the caller is discarded.
    pub fn disclose_node(
        &self,
        mut node: DisclosedNodeRecord,
    ) -> Result<()> {
        let control = self.control()?;
        node.identifier = NodeIdentifier::BLANK;
        let payload = encode(&Record::DisclosedNode(node))?;
        control.submit_disclosure(DisclosureKind::Node, &payload)
    }

    /// Injects an edge between two existing nodes. `id` and `jiffies` are
    /// assigned by the kernel.
    pub fn disclose_edge(
        &self,
        mut edge: EdgeRecord,
    ) -> Result<()> {
        let control = self.control()?;
        edge.id = 0;
        edge.jiffies = 0;
        let payload = encode(&Record::Edge(edge))?;
        control.submit_disclosure(DisclosureKind::Edge, &payload)
    }

    /// Task record of the calling process.
    pub fn self_record(&self) -> Result<TaskRecord> {
        let bytes = self.control()?.read_self()?;
        match decode(&bytes, ChannelKind::Short)? {
            Record::Task(task) => Ok(task),
            other => Err(DecodeError::InvalidField {
                field: "tag",
                value: other.tag().wire_value() as u64,
            }
            .into()),
        }
    }

    /// Control channel of a present subsystem.
    fn control(&self) -> Result<&dyn ControlChannel> {
        if !self.control.probe() {
            return Err(Error::SubsystemAbsent);
        }
        Ok(self.control.as_ref())
    }
}

impl std::fmt::Debug for Provenance {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Provenance")
            .field("registry", &self.registry)
            .field("policy", &self.policy)
            .finish()
    }
}
