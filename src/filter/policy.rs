use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use tracing::debug;

use super::FilterClass;
use super::FilterMask;
use super::FilterTarget;
use crate::wire::Record;
use crate::Error;
use crate::Result;

/// Local node/edge exclusion masks shared by the control path and every relay
/// task.
///
/// Each mask is a single atomic word: an update is visible to the next record
/// evaluated by any relay task, and a reader always observes either the old or
/// the new bit pattern.
#[derive(Debug, Default)]
pub struct FilterPolicy {
    node: AtomicU32,
    edge: AtomicU32,
}

impl FilterPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_mask(&self) -> FilterMask {
        FilterMask::from_bits(self.node.load(Ordering::Acquire))
    }

    pub fn edge_mask(&self) -> FilterMask {
        FilterMask::from_bits(self.edge.load(Ordering::Acquire))
    }

    pub fn add_node_filter(
        &self,
        mask: FilterMask,
    ) -> Result<()> {
        self.add(FilterTarget::Node, mask)
    }

    pub fn remove_node_filter(
        &self,
        mask: FilterMask,
    ) -> Result<()> {
        self.remove(FilterTarget::Node, mask)
    }

    pub fn add_edge_filter(
        &self,
        mask: FilterMask,
    ) -> Result<()> {
        self.add(FilterTarget::Edge, mask)
    }

    pub fn remove_edge_filter(
        &self,
        mask: FilterMask,
    ) -> Result<()> {
        self.remove(FilterTarget::Edge, mask)
    }

    /// Whether the record's type bit is set in the relevant mask.
    pub fn should_drop(
        &self,
        record: &Record,
    ) -> bool {
        match record.filter_class() {
            FilterClass::Node(node) => self.node_mask().intersects(node.mask()),
            FilterClass::Edge(edge) => self.edge_mask().intersects(edge.mask()),
        }
    }

    /// Rejects masks carrying bits outside the target's defined range.
    pub fn validate(
        target: FilterTarget,
        mask: FilterMask,
    ) -> Result<()> {
        let allowed = target.allowed_bits();
        if mask.bits() & !allowed != 0 {
            return Err(Error::InvalidFilterMask {
                mask: mask.bits(),
                allowed,
            });
        }
        Ok(())
    }

    fn word(
        &self,
        target: FilterTarget,
    ) -> &AtomicU32 {
        match target {
            FilterTarget::Node => &self.node,
            FilterTarget::Edge => &self.edge,
        }
    }

    fn add(
        &self,
        target: FilterTarget,
        mask: FilterMask,
    ) -> Result<()> {
        Self::validate(target, mask)?;
        let previous = self.word(target).fetch_or(mask.bits(), Ordering::AcqRel);
        debug!(?target, previous = previous, added = mask.bits(), "filter updated");
        Ok(())
    }

    fn remove(
        &self,
        target: FilterTarget,
        mask: FilterMask,
    ) -> Result<()> {
        Self::validate(target, mask)?;
        let previous = self.word(target).fetch_and(!mask.bits(), Ordering::AcqRel);
        debug!(?target, previous = previous, removed = mask.bits(), "filter updated");
        Ok(())
    }
}
