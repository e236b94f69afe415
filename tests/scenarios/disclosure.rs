use provenance_relay::control::Word;
use provenance_relay::wire::DisclosedNodeRecord;
use provenance_relay::wire::EdgeRecord;
use provenance_relay::wire::Record;
use provenance_relay::EdgeType;
use provenance_relay::ProvenanceOps;

use crate::common::node;
use crate::common::simulated;
use crate::common::task;
use crate::common::wait_until;
use crate::common::Seen;

#[tokio::test]
async fn disclosed_node_should_come_back_with_kernel_identifier() {
    let (kernel, provenance) = simulated(1);
    provenance.set_machine_id(12).unwrap();
    let disclosed = Seen::default();
    let sink = disclosed.clone();
    provenance
        .register(ProvenanceOps::new().on_disclosed_node(move |node| {
            sink.push(node);
            Ok(())
        }))
        .unwrap();

    provenance
        .disclose_node(DisclosedNodeRecord::new(b"{\"stage\":\"train\"}".to_vec()))
        .unwrap();

    assert!(wait_until(|| disclosed.len() == 1).await);
    let node = disclosed.values().remove(0);
    assert!(!node.identifier.is_blank());
    assert_eq!(node.identifier.machine_id, 12);
    assert_eq!(node.content, b"{\"stage\":\"train\"}".to_vec());
    assert_eq!(kernel.disclosures(), vec![Record::DisclosedNode(node)]);

    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn disclosed_edge_should_get_kernel_id_and_time() {
    let (kernel, provenance) = simulated(1);
    let mut edge = EdgeRecord::disclosed(EdgeType::Disclosed, node(1), node(2));
    edge.id = 999;

    provenance.disclose_edge(edge).unwrap();

    match kernel.disclosures().as_slice() {
        [Record::Edge(edge)] => {
            assert_ne!(edge.id, 999);
            assert_ne!(edge.jiffies, 0);
            assert_eq!(edge.relation, EdgeType::Disclosed);
        }
        other => panic!("unexpected disclosures {other:?}"),
    }
}

#[test]
fn self_record_should_describe_calling_task() {
    let (kernel, provenance) = simulated(1);
    kernel.set_self_task(task(4321));
    kernel.set_privileged(false);

    let me = provenance.self_record().unwrap();

    assert_eq!(me.pid, 4321);
    assert_eq!(me.identifier.machine_id, kernel.word(Word::MachineId));
}
