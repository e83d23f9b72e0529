use rand::{SeedableRng, rngs::StdRng};

use mlfq_sim::core::observer::violations;
use mlfq_sim::core::{DispatchOutcome, ProcState, SchedEvent, SimTime};
use mlfq_sim::scheduler::NUM_LEVELS;
use mlfq_sim::sim::{Decision, worker};
use mlfq_sim::{Coordinator, SimConfig, StopReason};

mod common;

use common::{Script, ScriptedTransport, setup_test, test_config};

/// Workers that follow the real decision distribution, seeded per job.
fn random_workers(seed: u64) -> ScriptedTransport {
    ScriptedTransport::new(move |job| {
        let mut rng = StdRng::seed_from_u64(seed ^ job);
        Box::new(move |allotment| worker::respond(allotment, &mut rng))
    })
}

/// Drive a full run tick by tick, checking the tables after every tick.
#[test]
fn random_workload_keeps_tables_consistent() {
    setup_test();
    let config = SimConfig {
        slots: 5,
        halt_on_spawn_quota: false,
        ..test_config(60)
    };
    let mut coordinator = Coordinator::new(config, random_workers(11)).unwrap();

    let mut last_clock = coordinator.now();
    let mut ticks = 0;
    let mut saw_slot_exhaustion = false;
    let mut saw_block = false;

    while coordinator.stop_reason(None).is_none() {
        ticks += 1;
        assert!(ticks < 1_000_000, "simulation did not finish");
        let events = coordinator.tick();
        let state = coordinator.state();

        let problems = violations(state);
        assert!(problems.is_empty(), "{problems:?}");
        assert!(coordinator.now() >= last_clock, "clock went backwards");
        last_clock = coordinator.now();
        assert!(state.idle.total() <= coordinator.now());

        for event in &events {
            match *event {
                SchedEvent::Dispatched {
                    level,
                    used,
                    outcome: DispatchOutcome::Requeued { level: target },
                    ..
                } => {
                    if used == state.levels.quantum(level) {
                        assert_eq!(target, (level + 1).min(NUM_LEVELS - 1));
                    } else {
                        assert_eq!(target, level);
                    }
                }
                SchedEvent::Dispatched {
                    outcome: DispatchOutcome::Blocked { .. },
                    ..
                } => saw_block = true,
                SchedEvent::SlotsExhausted { .. } => saw_slot_exhaustion = true,
                _ => {}
            }
        }

        for record in state.slots.occupied() {
            match record.state {
                ProcState::Ready => {
                    assert_eq!(state.levels.level_of(record.slot), Some(record.level));
                }
                ProcState::Blocked => assert!(state.blocked.contains(record.slot)),
                ProcState::Terminated => panic!("terminated job {} still holds a slot", record.seq),
            }
        }
    }

    let report = coordinator.shutdown(StopReason::AllWorkersExited);
    assert_eq!(report.spawned, 60);
    assert_eq!(report.completed, 60);
    assert_eq!(report.lost, 0);
    assert!(saw_block);
    assert!(saw_slot_exhaustion);
}

#[test]
fn spawn_failure_consumes_no_slot() {
    setup_test();
    let mut transport =
        ScriptedTransport::uniform(|allotment| (Decision::Ready, SimTime::from_fine(allotment.as_fine() / 2)));
    transport.fail_spawns = 1;
    let config = SimConfig {
        halt_on_spawn_quota: false,
        ..test_config(1)
    };
    let mut coordinator = Coordinator::new(config, transport).unwrap();

    let events = coordinator.tick();
    assert!(events.iter().any(|e| matches!(e, SchedEvent::SpawnFailed { .. })));
    assert_eq!(coordinator.state().slots.occupied_count(), 0);
    assert_eq!(coordinator.state().spawned, 0);

    // The next scheduled spawn succeeds and gets the lowest slot.
    let mut spawned = None;
    for _ in 0..20 {
        spawned = coordinator.tick().into_iter().find_map(|e| match e {
            SchedEvent::Spawned { slot, job, .. } => Some((slot, job)),
            _ => None,
        });
        if spawned.is_some() {
            break;
        }
    }
    assert_eq!(spawned, Some((0, 0)));
}

#[test]
fn worker_vanishing_mid_dispatch_frees_its_slot() {
    setup_test();
    let transport = ScriptedTransport::new(|_| -> Script {
        Box::new(|_: SimTime| -> Option<(Decision, SimTime)> { None })
    });
    let mut coordinator = Coordinator::new(test_config(1), transport).unwrap();

    let events = coordinator.tick();
    assert!(events.iter().any(|e| matches!(e, SchedEvent::JobLost { slot: 0, job: 0, .. })));
    assert_eq!(coordinator.state().slots.occupied_count(), 0);
    assert!(coordinator.state().levels.is_empty());
    assert_eq!(coordinator.state().lost, 1);

    let report = coordinator.run();
    assert_eq!(report.reason, StopReason::AllWorkersExited);
    assert_eq!(report.lost, 1);
    assert_eq!(report.completed, 0);
}

#[test]
fn overrunning_the_quantum_is_a_protocol_violation() {
    setup_test();
    let transport = ScriptedTransport::uniform(|allotment| {
        (Decision::Ready, allotment + SimTime::from_fine(1))
    });
    let mut coordinator = Coordinator::new(test_config(1), transport).unwrap();

    let events = coordinator.tick();
    assert!(events.iter().any(|e| matches!(e, SchedEvent::JobLost { .. })));
    assert!(!events.iter().any(|e| matches!(e, SchedEvent::Dispatched { .. })));
    assert_eq!(coordinator.state().slots.occupied_count(), 0);
    // The dropped job's worker is told to stop.
    assert_eq!(coordinator.transport().stops_sent(), 1);
}

#[test]
fn slot_exhaustion_skips_the_spawn() {
    setup_test();
    let transport = ScriptedTransport::uniform(|allotment| {
        (Decision::Ready, SimTime::from_fine(allotment.as_fine() / 2))
    });
    let config = SimConfig {
        slots: 1,
        ..test_config(3)
    };
    let mut coordinator = Coordinator::new(config, transport).unwrap();

    coordinator.tick();
    let events = coordinator.tick();
    assert!(events.iter().any(|e| matches!(e, SchedEvent::SlotsExhausted { .. })));
    assert_eq!(coordinator.state().spawned, 1);
    assert_eq!(coordinator.transport().live_workers(), 1);
}
