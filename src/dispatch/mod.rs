//! Record dispatch.
//!
//! The dispatcher decides, for every decoded record, whether it reaches
//! the application: unhandled tags are dropped first, then the filter masks
//! and the class predicate are consulted, then the typed handler runs with a
//! panic barrier around it.
mod ops;
pub use ops::*;


use std::any::Any;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::trace;
use tracing::warn;

use crate::filter::FilterClass;
use crate::filter::FilterPolicy;
use crate::wire::Record;
use crate::RelayStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran and returned `Ok`
    Delivered,
    /// No handler registered for the tag
    Unhandled,
    /// Dropped by a filter mask or predicate
    Filtered,
    /// Handler returned an error or panicked
    HandlerFailed,
}

/// Routes decoded records through the filters to the handler table of one
/// registration.
#[derive(Debug, Clone)]
pub(crate) struct Dispatcher {
    table: Arc<HandlerTable>,
    policy: Arc<FilterPolicy>,
    stats: Arc<RelayStats>,
}

impl Dispatcher {
    pub(crate) fn new(
        table: Arc<HandlerTable>,
        policy: Arc<FilterPolicy>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            table,
            policy,
            stats,
        }
    }

    pub(crate) fn dispatch(
        &self,
        record: Record,
    ) -> DispatchOutcome {
        let tag = record.tag();

        if !self.table.has_handler(tag) {
            trace!(%tag, "no handler registered");
            self.stats.record_unhandled();
            return DispatchOutcome::Unhandled;
        }

        if self.policy.should_drop(&record) {
            let reason = match record.filter_class() {
                FilterClass::Node(_) => "node_mask",
                FilterClass::Edge(_) => "edge_mask",
            };
            trace!(%tag, reason, "record filtered");
            self.stats.record_filtered(reason);
            return DispatchOutcome::Filtered;
        }

        if let Some(predicate) = self.table.predicate(record.channel()) {
            match catch_unwind(AssertUnwindSafe(|| predicate(&record))) {
                Ok(false) => {}
                Ok(true) => {
                    trace!(%tag, "record filtered by predicate");
                    self.stats.record_filtered("predicate");
                    return DispatchOutcome::Filtered;
                }
                Err(panic) => {
                    warn!(%tag, panic = %panic_message(&*panic), "record filter panicked");
                    self.stats.record_handler_failure(tag.name());
                    return DispatchOutcome::HandlerFailed;
                }
            }
        }

        match catch_unwind(AssertUnwindSafe(|| self.table.invoke(record))) {
            Ok(Ok(())) => {
                self.stats.record_delivered();
                DispatchOutcome::Delivered
            }
            Ok(Err(e)) => {
                warn!(%tag, error = %e, "handler failed");
                self.stats.record_handler_failure(tag.name());
                DispatchOutcome::HandlerFailed
            }
            Err(panic) => {
                warn!(%tag, panic = %panic_message(&*panic), "handler panicked");
                self.stats.record_handler_failure(tag.name());
                DispatchOutcome::HandlerFailed
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
