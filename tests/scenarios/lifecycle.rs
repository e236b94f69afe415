use std::time::Duration;
use std::time::Instant;

use provenance_relay::wire::Record;
use provenance_relay::Error;
use provenance_relay::LifecycleState;
use provenance_relay::ProvenanceOps;

use crate::common::simulated;
use crate::common::task;
use crate::common::wait_until;
use crate::common::Seen;

#[tokio::test]
async fn stop_without_register_should_succeed() {
    let (_kernel, provenance) = simulated(1);

    provenance.stop().await.unwrap();

    assert_eq!(provenance.lifecycle(), LifecycleState::Unregistered);
}

#[tokio::test]
async fn second_register_should_fail_until_stopped() {
    let (_kernel, provenance) = simulated(1);

    provenance.register(ProvenanceOps::new()).unwrap();
    assert!(matches!(
        provenance.register(ProvenanceOps::new()),
        Err(Error::AlreadyRegistered)
    ));

    provenance.stop().await.unwrap();
    provenance.stop().await.unwrap();
    assert_eq!(provenance.lifecycle(), LifecycleState::Stopped);

    provenance.register(ProvenanceOps::new()).unwrap();
    assert_eq!(provenance.lifecycle(), LifecycleState::Registered);
    provenance.stop().await.unwrap();
}

#[tokio::test]
async fn stop_should_complete_promptly_while_loops_are_blocked() {
    let (_kernel, provenance) = simulated(8);
    provenance.register(ProvenanceOps::new().on_task(|_| Ok(()))).unwrap();
    assert_eq!(provenance.active_channels().unwrap().len(), 16);

    let started = Instant::now();
    provenance.stop().await.unwrap();

    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(matches!(provenance.active_channels(), Err(Error::NotRegistered)));
}

#[tokio::test]
async fn no_handler_runs_after_stop_returns() {
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
    assert!(wait_until(|| pids.len() == 1).await);

    provenance.stop().await.unwrap();
    kernel.inject(&Record::Task(task(2))).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(pids.values(), vec![1]);
}

#[tokio::test]
async fn register_should_fail_without_subsystem() {
    let (kernel, provenance) = simulated(1);
    kernel.set_present(false);

    assert!(matches!(
        provenance.register(ProvenanceOps::new()),
        Err(Error::SubsystemAbsent)
    ));
    assert_eq!(provenance.lifecycle(), LifecycleState::Unregistered);
}
