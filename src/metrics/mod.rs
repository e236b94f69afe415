//! Relay counters.
//!
//! Process-wide prometheus collectors live in [`REGISTRY`]; every
//! [`crate::Provenance`] instance also keeps its own [`RelayStats`] so an
//! application can observe one registration in isolation.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;
use serde::Serialize;
use tracing::warn;


lazy_static! {
    pub static ref RECORDS_RECEIVED: IntCounterVec = IntCounterVec::new(
        Opts::new("provenance_records_received", "Raw records read from relay channels"),
        &["channel"]
    )
    .expect("metric can not be created");

    pub static ref DECODE_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("provenance_decode_errors", "Records rejected by the decoder"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref RECORDS_DROPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("provenance_records_dropped", "Decoded records not handed to a handler"),
        &["reason"]
    )
    .expect("metric can not be created");

    pub static ref HANDLER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("provenance_handler_failures", "Application handler errors and panics"),
        &["tag"]
    )
    .expect("metric can not be created");

    pub static ref CHANNEL_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("provenance_channel_errors", "Relay loops terminated by a channel failure"),
        &["channel"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_METRICS: Once = Once::new();

/// Registers the relay collectors with [`REGISTRY`]; later calls are no-ops.
pub fn register_custom_metrics() {
    REGISTER_METRICS.call_once(|| {
        let collectors: [&IntCounterVec; 5] = [
            &RECORDS_RECEIVED,
            &DECODE_ERRORS,
            &RECORDS_DROPPED,
            &HANDLER_FAILURES,
            &CHANNEL_ERRORS,
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(Box::new(collector.clone())) {
                warn!("collector can not be registered: {:?}", e);
            }
        }
    });
}

/// Prometheus text exposition of [`REGISTRY`].
pub fn gather_text() -> String {
    use prometheus::Encoder;

    register_custom_metrics();
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        warn!("could not encode relay metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Per-instance relay counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    delivered: AtomicU64,
    unhandled: AtomicU64,
    filtered: AtomicU64,
    decode_errors: AtomicU64,
    handler_failures: AtomicU64,
    channel_errors: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub received: u64,
    pub delivered: u64,
    pub unhandled: u64,
    pub filtered: u64,
    pub decode_errors: u64,
    pub handler_failures: u64,
    pub channel_errors: u64,
}

impl RelayStats {
    pub(crate) fn record_received(
        &self,
        channel: &str,
    ) {
        self.received.fetch_add(1, Ordering::Relaxed);
        RECORDS_RECEIVED.with_label_values(&[channel]).inc();
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unhandled(&self) {
        self.unhandled.fetch_add(1, Ordering::Relaxed);
        RECORDS_DROPPED.with_label_values(&["unhandled"]).inc();
    }

    pub(crate) fn record_filtered(
        &self,
        reason: &str,
    ) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
        RECORDS_DROPPED.with_label_values(&[reason]).inc();
    }

    pub(crate) fn record_decode_error(
        &self,
        kind: &str,
    ) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
        DECODE_ERRORS.with_label_values(&[kind]).inc();
    }

    pub(crate) fn record_handler_failure(
        &self,
        tag: &str,
    ) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
        HANDLER_FAILURES.with_label_values(&[tag]).inc();
    }

    pub(crate) fn record_channel_error(
        &self,
        channel: &str,
    ) {
        self.channel_errors.fetch_add(1, Ordering::Relaxed);
        CHANNEL_ERRORS.with_label_values(&[channel]).inc();
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unhandled: self.unhandled.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            channel_errors: self.channel_errors.load(Ordering::Relaxed),
        }
    }
}
