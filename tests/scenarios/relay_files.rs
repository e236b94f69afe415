use std::fs;
use std::path::Path;

use provenance_relay::wire::encode;
use provenance_relay::wire::Record;
use provenance_relay::wire::StringRecord;
use provenance_relay::Provenance;
use provenance_relay::ProvenanceConfig;
use provenance_relay::ProvenanceOps;
use tempfile::TempDir;

use crate::common::node;
use crate::common::task;
use crate::common::wait_until;
use crate::common::Seen;

const CONTROL_FILES: [&str; 10] = [
    "enable",
    "all",
    "opaque",
    "tracked",
    "node_filter",
    "edge_filter",
    "machine_id",
    "disclose_node",
    "disclose_edge",
    "self",
];

struct FakeKernel {
    _root: TempDir,
    config: ProvenanceConfig,
}

fn fake_kernel() -> FakeKernel {
    let root = tempfile::tempdir().unwrap();
    let securityfs = root.path().join("security/provenance");
    let debugfs = root.path().join("debug");
    fs::create_dir_all(&securityfs).unwrap();
    fs::create_dir_all(&debugfs).unwrap();
    for name in CONTROL_FILES {
        fs::write(securityfs.join(name), b"").unwrap();
    }

    let mut config = ProvenanceConfig::default();
    config.control.securityfs_dir = securityfs;
    config.relay.relay_dir = debugfs;
    config.relay.idle_poll_interval_ms = 5;
    FakeKernel {
        _root: root,
        config,
    }
}

fn write_records(
    path: &Path,
    records: &[Record],
) {
    let mut bytes = Vec::new();
    for record in records {
        bytes.extend(encode(record).unwrap());
    }
    fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn relay_files_should_be_decoded_and_dispatched() {
    let kernel = fake_kernel();
    let relay_dir = kernel.config.relay.relay_dir.clone();
    write_records(
        &relay_dir.join("provenance0"),
        &[Record::Task(task(1)), Record::Task(task(2))],
    );
    write_records(&relay_dir.join("provenance1"), &[Record::Task(task(3))]);
    write_records(
        &relay_dir.join("long_provenance0"),
        &[Record::String(StringRecord {
            identifier: node(4),
            text: "/usr/bin/make".to_string(),
        })],
    );
    let provenance = Provenance::builder()
        .config(kernel.config.clone())
        .build()
        .unwrap();
    assert!(provenance.is_present());

    let pids = Seen::default();
    let strings = Seen::default();
    let (pid_sink, string_sink) = (pids.clone(), strings.clone());
    provenance
        .register(
            ProvenanceOps::new()
                .on_task(move |task| {
                    pid_sink.push(task.pid);
                    Ok(())
                })
                .on_string(move |string| {
                    string_sink.push(string.text);
                    Ok(())
                }),
        )
        .unwrap();

    assert!(wait_until(|| pids.len() == 3 && strings.len() == 1).await);
    let mut seen = pids.values();
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(strings.values(), vec!["/usr/bin/make".to_string()]);
    assert_eq!(provenance.active_channels().unwrap().len(), 3);

    provenance.stop().await.unwrap();
}

#[test]
fn control_calls_should_write_securityfs_files() {
    let kernel = fake_kernel();
    let securityfs = kernel.config.control.securityfs_dir.clone();
    let provenance = Provenance::builder()
        .config(kernel.config.clone())
        .build()
        .unwrap();

    provenance.set_enable(true).unwrap();
    provenance.set_machine_id(0x0A0B0C0D).unwrap();

    assert_eq!(fs::read(securityfs.join("enable")).unwrap(), b"1");
    assert_eq!(
        fs::read(securityfs.join("machine_id")).unwrap(),
        vec![0x0D, 0x0C, 0x0B, 0x0A]
    );
    assert!(provenance.get_enable().unwrap());
    assert_eq!(provenance.get_machine_id().unwrap(), 0x0A0B0C0D);
}

#[tokio::test]
async fn missing_relay_files_should_fail_register() {
    let kernel = fake_kernel();
    let provenance = Provenance::builder()
        .config(kernel.config.clone())
        .build()
        .unwrap();

    let result = provenance.register(ProvenanceOps::new());

    assert!(matches!(
        result,
        Err(provenance_relay::Error::SubsystemAbsent)
    ));
}
