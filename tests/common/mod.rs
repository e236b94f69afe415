use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use provenance_relay::wire::NodeIdentifier;
use provenance_relay::wire::TaskRecord;
use provenance_relay::Provenance;
use provenance_relay::ProvenanceConfig;
use provenance_relay::SimulatedKernel;

pub const WAIT_FOR_DELIVERY: Duration = Duration::from_secs(2);

/// Instance wired to a fresh simulated kernel with `cpus` channels per class.
pub fn simulated(cpus: u32) -> (SimulatedKernel, Provenance) {
    let kernel = SimulatedKernel::new(cpus);
    let mut config = ProvenanceConfig::default();
    config.relay.stop_grace_period_ms = 500;
    let provenance = Provenance::builder()
        .config(config)
        .simulated(&kernel)
        .build()
        .expect("simulated instance should build");
    (kernel, provenance)
}

pub fn task(pid: u32) -> TaskRecord {
    TaskRecord {
        identifier: NodeIdentifier {
            id: pid as u64,
            boot_id: 1,
            machine_id: 0,
            version: 1,
        },
        uid: 1000,
        gid: 1000,
        pid,
        vpid: pid,
        utime: 0,
        stime: 0,
        vm: 0,
        rss: 0,
    }
}

pub fn node(id: u64) -> NodeIdentifier {
    NodeIdentifier {
        id,
        boot_id: 1,
        machine_id: 0,
        version: 1,
    }
}

/// Shared log of values observed by handlers.
#[derive(Debug)]
pub struct Seen<T>(Arc<Mutex<Vec<T>>>);

impl<T> Default for Seen<T> {
    fn default() -> Self {
        Seen(Arc::new(Mutex::new(Vec::new())))
    }
}

impl<T> Clone for Seen<T> {
    fn clone(&self) -> Self {
        Seen(self.0.clone())
    }
}

impl<T: Clone> Seen<T> {
    pub fn push(
        &self,
        value: T,
    ) {
        self.0.lock().push(value);
    }

    pub fn values(&self) -> Vec<T> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_FOR_DELIVERY;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
