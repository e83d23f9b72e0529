use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, error, info, warn};

use super::{
    event::{DispatchOutcome, SchedEvent},
    observer::Observer,
    report::Report,
    state::{ProcState, SchedulerState, SeqId, SlotId},
    time::SimTime,
};
use crate::config::SimConfig;
use crate::error::{ConfigError, DispatchError};
use crate::sim::{Decision, ExitStatus, Request, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    // No more scheduling; telling workers to stop
    Draining,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    StopRequested,
    DeadlineExpired,
    AllWorkersExited,
    SpawnQuotaExhausted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::StopRequested => "stop requested",
            StopReason::DeadlineExpired => "runtime budget expired",
            StopReason::AllWorkersExited => "all workers exited",
            StopReason::SpawnQuotaExhausted => "spawn quota exhausted",
        };
        f.write_str(text)
    }
}

/// The scheduling engine: owns the tables and talks to workers through `T`.
pub struct Coordinator<T: Transport> {
    state: SchedulerState,
    transport: T,
    config: SimConfig,
    rng: StdRng,
    observer: Observer,
    phase: Phase,
    halted: Option<StopReason>,
    stop: Arc<AtomicBool>,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(config: SimConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            state: SchedulerState::new(config.slots, config.base_quantum),
            transport,
            config,
            rng,
            observer: Observer::new(),
            phase: Phase::Running,
            halted: None,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that ends the run before the next tick once set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn now(&self) -> SimTime {
        self.state.now()
    }

    /// Tick until a stop trigger fires, then shut down.
    pub fn run(&mut self) -> Report {
        let deadline = self.config.runtime_budget.map(|budget| Instant::now() + budget);
        info!(
            max_jobs = self.config.max_jobs,
            slots = self.config.slots,
            quantum = %self.config.base_quantum,
            "starting simulation"
        );

        let reason = loop {
            // Exits must be counted before deciding whether to stop.
            self.reap(&mut Vec::new());
            if let Some(reason) = self.stop_reason(deadline) {
                break reason;
            }
            self.tick();
        };
        self.shutdown(reason)
    }

    /// One scheduling tick: reap exits, advance the clock, then spawn,
    /// unblock and dispatch at most once each.
    pub fn tick(&mut self) -> Vec<SchedEvent> {
        let mut events = Vec::new();
        if self.phase != Phase::Running || self.halted.is_some() {
            return events;
        }

        self.reap(&mut events);
        self.state.advance_time(self.config.timestep);

        if self.spawn_step(&mut events) {
            self.halted = Some(StopReason::SpawnQuotaExhausted);
        } else {
            self.unblock_step(&mut events);
            self.dispatch_step(&mut events);
        }

        self.observer.observe(&self.state);
        events
    }

    pub fn stop_reason(&self, deadline: Option<Instant>) -> Option<StopReason> {
        if let Some(reason) = self.halted {
            return Some(reason);
        }
        if self.stop.load(Ordering::Relaxed) {
            return Some(StopReason::StopRequested);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(StopReason::DeadlineExpired);
        }
        if self.state.exited >= self.config.max_jobs {
            return Some(StopReason::AllWorkersExited);
        }
        None
    }

    /// Build the report, tell every live worker to stop and release the transport.
    pub fn shutdown(&mut self, reason: StopReason) -> Report {
        self.phase = Phase::Draining;
        let now = self.state.now();
        info!(%reason, %now, "scheduler stopping");

        let report = Report::new(&self.state, reason);
        for line in report.to_string().lines() {
            info!("{line}");
        }

        let live: Vec<_> = self.state.handles().collect();
        for (handle, slot) in live {
            if let Err(err) = self.transport.send(handle, Request::STOP) {
                warn!(slot, %err, %now, "failed to send stop directive");
            }
        }
        self.transport.release();

        self.phase = Phase::Terminated;
        info!(%now, "scheduler done");
        report
    }

    fn reap(&mut self, events: &mut Vec<SchedEvent>) {
        for exit in self.transport.reap() {
            self.state.exited += 1;
            let now = self.state.now();
            let slot = self.state.slot_of(exit.handle);

            match exit.status {
                ExitStatus::Clean => debug!(worker = ?exit.handle, %now, "worker exited"),
                ExitStatus::Crashed => warn!(worker = ?exit.handle, %now, "worker crashed"),
            }
            if let Some(slot) = slot {
                warn!(slot, %now, "worker exited while its job was still scheduled");
                self.drop_job(slot, events);
            }
            events.push(SchedEvent::WorkerExited {
                handle: exit.handle,
                slot,
            });

            if self.state.exited == self.config.max_jobs {
                info!(%now, "all workers exited");
            }
        }
    }

    /// Returns `true` when the loop must halt on an exhausted spawn quota.
    fn spawn_step(&mut self, events: &mut Vec<SchedEvent>) -> bool {
        let now = self.state.now();
        let Some(due) = self.state.next_spawn else {
            return false;
        };
        if now < due {
            return false;
        }

        if self.state.spawned >= self.config.max_jobs {
            info!(spawned = self.state.spawned, %now, "spawn quota exhausted");
            events.push(SchedEvent::SpawnQuotaExhausted { at: now });
            if self.config.halt_on_spawn_quota {
                return true;
            }
            self.state.next_spawn = None;
            return false;
        }

        self.spawn_job(events);
        let gap = self.spawn_gap();
        self.state.next_spawn = Some(now + gap);
        debug!(next = %(now + gap), %now, "next spawn scheduled");
        false
    }

    fn spawn_job(&mut self, events: &mut Vec<SchedEvent>) {
        let now = self.state.now();
        let Some(slot) = self.state.slots.lowest_free() else {
            warn!(%now, "no free slot for a new job");
            events.push(SchedEvent::SlotsExhausted { at: now });
            return;
        };

        let handle = match self.transport.spawn() {
            Ok(handle) => handle,
            Err(err) => {
                error!(%err, %now, "failed to spawn worker");
                events.push(SchedEvent::SpawnFailed { at: now });
                return;
            }
        };

        let job = self.state.admit(slot, handle);
        if let Err(err) = self.state.levels.enqueue(0, slot) {
            error!(job, slot, %err, %now, "failed to queue new job");
            self.drop_job(slot, events);
            return;
        }
        info!(job, slot, %now, "generated job and put it in queue 0");
        events.push(SchedEvent::Spawned { slot, job, at: now });
    }

    fn spawn_gap(&mut self) -> SimTime {
        let coarse = match self.config.spawn_jitter_coarse {
            0 => 0,
            max => self.rng.random_range(0..max),
        };
        let fine = match self.config.spawn_jitter_fine {
            0 => 0,
            max => self.rng.random_range(0..max),
        };
        SimTime::new(coarse, fine)
    }

    fn dispatch_overhead(&mut self) -> SimTime {
        match self.config.dispatch_overhead {
            0 => SimTime::ZERO,
            max => SimTime::from_fine(self.rng.random_range(0..max)),
        }
    }

    fn unblock_step(&mut self, events: &mut Vec<SchedEvent>) {
        let now = self.state.now();
        let Some(index) = self.state.blocked.first_due(now, &self.state.slots) else {
            return;
        };
        let Ok(slot) = self.state.blocked.remove_at(index) else {
            return;
        };
        let Some(record) = self.state.record_mut(slot) else {
            error!(slot, %now, "blocked set held an empty slot");
            return;
        };

        let slept = record.last_burst;
        let job = record.seq;
        record.set_state(ProcState::Ready);
        record.last_burst = SimTime::ZERO;
        record.blocked_until = SimTime::ZERO;
        record.ready_at = now;
        record.level = 0;
        self.state.totals.sleep += slept;

        if let Err(err) = self.state.levels.enqueue(0, slot) {
            error!(job, slot, %err, %now, "failed to queue unblocked job");
            self.drop_job(slot, events);
            return;
        }
        info!(job, %slept, %now, "unblocked job to queue 0");
        events.push(SchedEvent::Unblocked {
            slot,
            job,
            slept,
            at: now,
        });
    }

    fn dispatch_step(&mut self, events: &mut Vec<SchedEvent>) {
        let now = self.state.now();
        let Some(level) = self.state.levels.select_ready(&self.state.slots, now) else {
            self.go_idle(events);
            return;
        };

        if let Some(lasted) = self.state.idle.off(now) {
            info!(%lasted, %now, "cpu idle off");
        }

        let Some(slot) = self.state.levels.pop(level) else {
            return;
        };
        if let Err(err) = self.dispatch(slot, level, events) {
            error!(slot, level, %err, %now, "dispatch failed, dropping job");
            self.drop_job(slot, events);
        }
    }

    /// Nothing is runnable: mark the CPU idle and skip ahead to the next
    /// moment something can happen.
    fn go_idle(&mut self, events: &mut Vec<SchedEvent>) {
        let from = self.state.now();
        if self.state.idle.on(from) {
            info!(now = %from, "cpu idle on");
        }

        let target = if self.state.blocked.is_empty() {
            self.state.next_spawn
        } else {
            self.state.blocked.front_wake_time(&self.state.slots)
        };
        let jumped_to = target.filter(|&to| self.state.jump_to(to));
        if let Some(to) = jumped_to {
            debug!(%to, now = %from, "nothing ready, jumping clock");
        }
        events.push(SchedEvent::Idle { from, jumped_to });
    }

    /// One synchronous round trip with the worker behind `slot`.
    ///
    /// The slot has already been popped from `level`. On error nothing about
    /// the job has been changed yet. Besides a reply from the wrong worker, a
    /// Ready reply claiming more than the allotment is a protocol violation.
    fn dispatch(
        &mut self,
        slot: SlotId,
        level: usize,
        events: &mut Vec<SchedEvent>,
    ) -> Result<(), DispatchError> {
        let quantum = self.state.levels.quantum(level);
        let (handle, job) = self
            .state
            .record(slot)
            .map(|r| (r.handle, r.seq))
            .ok_or_else(|| DispatchError::Protocol {
                slot,
                reason: "slot is empty".to_string(),
            })?;

        let now = self.state.now();
        info!(job, level, %quantum, %now, "dispatching job");

        self.transport.send(handle, Request { allotment: quantum })?;
        let reply = self.transport.receive(handle)?;

        if reply.sender != handle {
            return Err(DispatchError::Protocol {
                slot,
                reason: format!("reply came from {:?}", reply.sender),
            });
        }
        if reply.decision == Decision::Ready && reply.used > quantum {
            return Err(DispatchError::Protocol {
                slot,
                reason: format!("used {} of a {} quantum", reply.used, quantum),
            });
        }

        let used = reply.used;
        let outcome = match reply.decision {
            Decision::Terminated => self.on_terminated(slot, used),
            Decision::Blocked => self.on_blocked(slot, used),
            Decision::Ready => self.on_ready(slot, level, used),
        };

        events.push(SchedEvent::Dispatched {
            slot,
            job,
            level,
            used,
            at: now,
            outcome,
        });
        if let DispatchOutcome::Blocked { .. } | DispatchOutcome::Requeued { .. } = outcome {
            if self.state.record(slot).is_none() {
                events.push(SchedEvent::JobLost { slot, job, at: now });
            }
        }

        let overhead = self.dispatch_overhead();
        self.state.advance_time(overhead);
        debug!(%overhead, now = %self.state.now(), "dispatch overhead");
        Ok(())
    }

    fn on_terminated(&mut self, slot: SlotId, used: SimTime) -> DispatchOutcome {
        let now = self.state.now();
        let Some(record) = self.state.record_mut(slot) else {
            return DispatchOutcome::Terminated;
        };
        record.set_state(ProcState::Terminated);
        record.last_burst = used;
        record.cpu += used;
        record.sys = now - record.forked_at;
        let (job, sys, cpu) = (record.seq, record.sys, record.cpu);

        self.state.totals.turnaround += sys;
        self.state.totals.wait += sys - cpu;
        self.state.completed += 1;
        self.state.release_slot(slot);

        info!(job, turnaround = %sys, cpu = %cpu, %now, "job terminated");
        DispatchOutcome::Terminated
    }

    fn on_blocked(&mut self, slot: SlotId, used: SimTime) -> DispatchOutcome {
        let now = self.state.now();
        let until = now + used;
        let Some(record) = self.state.record_mut(slot) else {
            return DispatchOutcome::Blocked { until };
        };
        record.set_state(ProcState::Blocked);
        record.last_burst = used;
        record.blocked_until = until;
        let job = record.seq;

        if let Err(err) = self.state.blocked.push(slot) {
            error!(job, %err, %now, "failed to put job in the blocked set");
            self.discard(slot);
        } else {
            info!(job, %until, %now, "job blocked on i/o");
        }
        DispatchOutcome::Blocked { until }
    }

    fn on_ready(&mut self, slot: SlotId, level: usize, used: SimTime) -> DispatchOutcome {
        let now = self.state.now();
        let target = self.state.levels.next_level(level, used);
        let Some(record) = self.state.record_mut(slot) else {
            return DispatchOutcome::Requeued { level: target };
        };
        record.set_state(ProcState::Ready);
        record.last_burst = used;
        record.cpu += used;
        record.ready_at = now;
        record.level = target;
        let job = record.seq;

        if used != self.state.levels.quantum(level) {
            debug!(job, %used, %now, "job did not use its entire quantum");
        }
        self.state.advance_time(used);

        if let Err(err) = self.state.levels.enqueue(target, slot) {
            error!(job, level = target, %err, %now, "failed to requeue job");
            self.discard(slot);
        } else {
            info!(job, ran = %used, level = target, now = %self.state.now(), "job moved to queue");
        }
        DispatchOutcome::Requeued { level: target }
    }

    /// Remove a job from every queue, free its slot and stop its worker.
    fn drop_job(&mut self, slot: SlotId, events: &mut Vec<SchedEvent>) {
        let now = self.state.now();
        if let Some(job) = self.discard(slot) {
            events.push(SchedEvent::JobLost { slot, job, at: now });
        }
    }

    fn discard(&mut self, slot: SlotId) -> Option<SeqId> {
        self.state.detach(slot);
        let record = self.state.release_slot(slot)?;
        self.state.lost += 1;
        // The worker may already be gone; a failed send changes nothing.
        if let Err(err) = self.transport.send(record.handle, Request::STOP) {
            debug!(job = record.seq, %err, "stop directive not delivered");
        }
        warn!(job = record.seq, slot, now = %self.state.now(), "job lost");
        Some(record.seq)
    }
}
