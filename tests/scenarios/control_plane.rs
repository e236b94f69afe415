use provenance_relay::control::Flag;
use provenance_relay::control::Word;
use provenance_relay::ControlChannel;
use provenance_relay::EdgeType;
use provenance_relay::Error;
use provenance_relay::FilterMask;
use provenance_relay::NodeType;

use crate::common::simulated;

#[test]
fn unprivileged_set_enable_should_be_denied_and_leave_flag() {
    let (kernel, provenance) = simulated(1);
    kernel.set_privileged(false);

    let result = provenance.set_enable(true);

    assert!(matches!(
        result,
        Err(Error::PermissionDenied {
            operation: "set_enable"
        })
    ));
    assert!(!kernel.flag(Flag::Enable));
    assert!(!provenance.get_enable().unwrap());
}

#[test]
fn privileged_flags_should_round_trip_through_kernel() {
    let (kernel, provenance) = simulated(1);

    provenance.set_enable(true).unwrap();
    provenance.set_all(true).unwrap();
    provenance.set_opaque(true).unwrap();
    provenance.set_tracked(true).unwrap();

    assert!(provenance.get_enable().unwrap());
    assert!(provenance.get_all().unwrap());
    assert!(kernel.flag(Flag::Opaque));
    assert!(kernel.flag(Flag::Tracked));

    provenance.set_all(false).unwrap();
    assert!(!provenance.get_all().unwrap());
}

#[test]
fn filter_masks_should_follow_add_and_remove() {
    let (kernel, provenance) = simulated(1);
    let prior = NodeType::Task.mask();
    let added = NodeType::Socket.mask() | NodeType::Address.mask();

    provenance.add_node_filter(prior).unwrap();
    provenance.add_node_filter(added).unwrap();
    assert_eq!(provenance.get_node_filter().unwrap(), prior | added);
    assert_eq!(provenance.filter_policy().node_mask(), prior | added);

    provenance.remove_node_filter(added).unwrap();
    assert_eq!(provenance.get_node_filter().unwrap(), prior);
    assert_eq!(provenance.filter_policy().node_mask(), prior);

    provenance.add_edge_filter(EdgeType::Mmap).unwrap();
    assert_eq!(kernel.word(Word::EdgeFilter), EdgeType::Mmap.mask().bits());
}

#[test]
fn out_of_range_mask_should_be_rejected_everywhere() {
    let (kernel, provenance) = simulated(1);

    let result = provenance.add_edge_filter(FilterMask::from_bits(1 << 16));

    assert!(matches!(result, Err(Error::InvalidFilterMask { .. })));
    assert_eq!(kernel.word(Word::EdgeFilter), 0);
    assert!(provenance.filter_policy().edge_mask().is_empty());
}

#[test]
fn machine_id_should_reflect_kernel_changes() {
    let (kernel, provenance) = simulated(1);

    provenance.set_machine_id(0xCAFE).unwrap();
    assert_eq!(provenance.get_machine_id().unwrap(), 0xCAFE);

    // Another process changed it behind our back.
    kernel.set_u32(Word::MachineId, 7).unwrap();
    assert_eq!(provenance.get_machine_id().unwrap(), 7);
}

#[test]
fn unloaded_subsystem_should_be_reported() {
    let (kernel, provenance) = simulated(1);
    assert!(provenance.is_present());

    kernel.set_present(false);

    assert!(!provenance.is_present());
    assert!(matches!(provenance.get_all(), Err(Error::SubsystemAbsent)));
    assert!(matches!(provenance.get_machine_id(), Err(Error::SubsystemAbsent)));
}
