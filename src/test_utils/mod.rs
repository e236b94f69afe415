//! Record builders shared by the unit tests.
use crate::filter::EdgeType;
use crate::wire::AddressRecord;
use crate::wire::DisclosedNodeRecord;
use crate::wire::EdgeRecord;
use crate::wire::FileNameRecord;
use crate::wire::IfcContextRecord;
use crate::wire::InodeRecord;
use crate::wire::MsgQueueRecord;
use crate::wire::NodeIdentifier;
use crate::wire::Record;
use crate::wire::SharedMemoryRecord;
use crate::wire::SocketRecord;
use crate::wire::StringRecord;
use crate::wire::TaskRecord;

pub(crate) fn node_id(id: u64) -> NodeIdentifier {
    NodeIdentifier {
        id,
        boot_id: 7,
        machine_id: 42,
        version: 1,
    }
}

pub(crate) fn sample_task(pid: u32) -> TaskRecord {
    TaskRecord {
        identifier: node_id(pid as u64 + 1000),
        uid: 1000,
        gid: 1000,
        pid,
        vpid: pid,
        utime: 11,
        stime: 22,
        vm: 4096,
        rss: 1024,
    }
}

pub(crate) fn sample_inode(ino: u64) -> InodeRecord {
    InodeRecord {
        identifier: node_id(ino + 5000),
        uid: 0,
        gid: 0,
        mode: 0o100644,
        ino,
        secid: 3,
    }
}

pub(crate) fn sample_edge(relation: EdgeType) -> EdgeRecord {
    EdgeRecord {
        id: 77,
        relation,
        allowed: true,
        source: node_id(1),
        destination: node_id(2),
        jiffies: 123_456,
    }
}

/// One record of every tag.
pub(crate) fn sample_records() -> Vec<Record> {
    vec![
        Record::Edge(sample_edge(EdgeType::Write)),
        Record::Task(sample_task(321)),
        Record::Inode(sample_inode(99)),
        Record::String(StringRecord {
            identifier: node_id(10),
            text: "execve /usr/bin/true".to_string(),
        }),
        Record::DisclosedNode(DisclosedNodeRecord {
            identifier: node_id(11),
            content: b"{\"app\":\"workflow\"}".to_vec(),
        }),
        Record::MsgQueue(MsgQueueRecord {
            identifier: node_id(12),
            msg_type: 3,
        }),
        Record::SharedMemory(SharedMemoryRecord {
            identifier: node_id(13),
            mode: 0o600,
        }),
        Record::Socket(SocketRecord {
            identifier: node_id(14),
            sock_type: 1,
            family: 2,
            protocol: 6,
        }),
        Record::Address(AddressRecord {
            identifier: node_id(15),
            family: 2,
            address: vec![0x1f, 0x90, 127, 0, 0, 1],
        }),
        Record::FileName(FileNameRecord {
            identifier: node_id(16),
            inode: node_id(5099),
            name: b"/etc/passwd".to_vec(),
        }),
        Record::IfcContext(IfcContextRecord {
            identifier: node_id(17),
            secrecy: vec![1, 2],
            integrity: vec![9],
        }),
    ]
}

/// Polls `condition` every few milliseconds until it holds or `within` elapses.
pub(crate) async fn wait_until(
    within: std::time::Duration,
    condition: impl Fn() -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    condition()
}
