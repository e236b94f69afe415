use provenance_relay::wire::encode;
use provenance_relay::wire::ChannelKind;
use provenance_relay::wire::InodeRecord;
use provenance_relay::wire::Record;
use provenance_relay::wire::StringRecord;
use provenance_relay::DispatchOutcome;
use provenance_relay::EdgeType;
use provenance_relay::Error;
use provenance_relay::NodeType;
use provenance_relay::ProvenanceOps;

use crate::common::node;
use crate::common::simulated;
use crate::common::task;
use crate::common::wait_until;
use crate::common::Seen;

fn inode(ino: u64) -> InodeRecord {
    InodeRecord {
        identifier: node(ino),
        uid: 0,
        gid: 0,
        mode: 0o100644,
        ino,
        secid: 0,
    }
}

#[tokio::test]
async fn only_handled_tags_should_reach_handlers_in_order() {
    let (kernel, provenance) = simulated(1);
    let pids = Seen::default();
    let sink = pids.clone();
    provenance
        .register(ProvenanceOps::new().on_task(move |task| {
            sink.push(task.pid);
            Ok(())
        }))
        .unwrap();

    kernel.inject(&Record::Task(task(1))).unwrap();
    kernel.inject(&Record::Inode(inode(2))).unwrap();
    kernel.inject(&Record::Task(task(3))).unwrap();

    assert!(wait_until(|| provenance.stats().received == 3).await);
    assert_eq!(pids.values(), vec![1, 3]);
    let stats = provenance.stats();
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.unhandled, 1);

    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn filtered_node_type_should_never_reach_handler() {
    let (kernel, provenance) = simulated(1);
    let inodes = Seen::default();
    let tasks = Seen::default();
    let (inode_sink, task_sink) = (inodes.clone(), tasks.clone());
    provenance
        .register(
            ProvenanceOps::new()
                .on_inode(move |inode| {
                    inode_sink.push(inode.ino);
                    Ok(())
                })
                .on_task(move |task| {
                    task_sink.push(task.pid);
                    Ok(())
                }),
        )
        .unwrap();

    provenance.add_node_filter(NodeType::Inode).unwrap();
    kernel.inject(&Record::Inode(inode(10))).unwrap();
    kernel.inject(&Record::Task(task(11))).unwrap();
    assert!(wait_until(|| tasks.len() == 1).await);
    assert!(inodes.values().is_empty());
    assert_eq!(provenance.stats().filtered, 1);

    provenance.remove_node_filter(NodeType::Inode).unwrap();
    kernel.inject(&Record::Inode(inode(12))).unwrap();
    assert!(wait_until(|| inodes.len() == 1).await);
    assert_eq!(inodes.values(), vec![12]);

    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn edge_filter_and_predicates_should_drop_records() {
    let (kernel, provenance) = simulated(1);
    let relations = Seen::default();
    let strings = Seen::default();
    let (edge_sink, string_sink) = (relations.clone(), strings.clone());
    provenance
        .register(
            ProvenanceOps::new()
                .long_filter(|record| {
                    matches!(record, Record::String(s) if s.text.contains("password"))
                })
                .on_edge(move |edge| {
                    edge_sink.push(edge.relation);
                    Ok(())
                })
                .on_string(move |string| {
                    string_sink.push(string.text);
                    Ok(())
                }),
        )
        .unwrap();
    provenance.add_edge_filter(EdgeType::Read).unwrap();

    for relation in [EdgeType::Read, EdgeType::Write] {
        let edge = provenance_relay::wire::EdgeRecord {
            id: 1,
            relation,
            allowed: true,
            source: node(1),
            destination: node(2),
            jiffies: 9,
        };
        kernel.inject(&Record::Edge(edge)).unwrap();
    }
    for text in ["password=hunter2", "argv: ls"] {
        kernel
            .inject(&Record::String(StringRecord {
                identifier: node(3),
                text: text.to_string(),
            }))
            .unwrap();
    }

    assert!(wait_until(|| provenance.stats().received == 4).await);
    assert_eq!(relations.values(), vec![EdgeType::Write]);
    assert_eq!(strings.values(), vec!["argv: ls".to_string()]);
    assert_eq!(provenance.stats().filtered, 2);

    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn malformed_and_failing_records_should_not_stop_relay() {
    let (kernel, provenance) = simulated(1);
    let pids = Seen::default();
    let sink = pids.clone();
    provenance
        .register(ProvenanceOps::new().on_task(move |task| {
            if task.pid == 13 {
                panic!("unlucky pid");
            }
            if task.pid == 14 {
                return Err("refused".into());
            }
            sink.push(task.pid);
            Ok(())
        }))
        .unwrap();

    kernel.inject_raw(ChannelKind::Short, 0, vec![0xEE, 0xEE, 1, 0]);
    kernel.inject(&Record::Task(task(13))).unwrap();
    kernel.inject(&Record::Task(task(14))).unwrap();
    kernel.inject(&Record::Task(task(15))).unwrap();

    assert!(wait_until(|| pids.len() == 1).await);
    assert_eq!(pids.values(), vec![15]);
    let stats = provenance.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.handler_failures, 2);

    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn channel_failure_should_only_end_its_own_loop() {
    let (kernel, provenance) = simulated(2);
    let pids = Seen::default();
    let sink = pids.clone();
    provenance
        .register(ProvenanceOps::new().on_task(move |task| {
            sink.push(task.pid);
            Ok(())
        }))
        .unwrap();

    kernel.fail_channel(ChannelKind::Short, 0, "relay buffer lost");
    assert!(wait_until(|| provenance.stats().channel_errors == 1).await);

    kernel.inject_on(1, &Record::Task(task(21))).unwrap();
    assert!(wait_until(|| pids.len() == 1).await);

    let channels = provenance.active_channels().unwrap();
    let dead: Vec<_> = channels
        .iter()
        .filter(|c| !c.running)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(dead, vec!["provenance0"]);

    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn records_pushed_by_the_application_should_share_relay_dispatch() {
    let (kernel, provenance) = simulated(1);
    assert!(matches!(provenance.record(Record::Task(task(1))), Err(Error::NotRegistered)));

    let pids = Seen::default();
    let sink = pids.clone();
    provenance
        .register(ProvenanceOps::new().on_task(move |task| {
            sink.push(task.pid);
            Ok(())
        }))
        .unwrap();

    kernel.inject(&Record::Task(task(2))).unwrap();
    assert!(wait_until(|| pids.values().len() == 1).await);

    assert_eq!(
        provenance.record(Record::Task(task(3))).unwrap(),
        DispatchOutcome::Delivered
    );
    let raw = encode(&Record::Task(task(4))).unwrap();
    assert_eq!(
        provenance.record_raw(&raw, ChannelKind::Short).unwrap(),
        DispatchOutcome::Delivered
    );

    assert_eq!(pids.values(), vec![2, 3, 4]);
    provenance.stop().await.unwrap();
}
