#![allow(dead_code)]

use std::io;

use slotmap::SlotMap;
use tracing_subscriber::EnvFilter;

use mlfq_sim::core::SimTime;
use mlfq_sim::error::TransportError;
use mlfq_sim::sim::{Decision, ExitStatus, Reply, Request, Transport, WorkerExit, WorkerHandle};
use mlfq_sim::SimConfig;

/// Initialize tracing from `RUST_LOG`. Safe to call from every test.
pub fn setup_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Deterministic config with no wall-clock budget.
pub fn test_config(max_jobs: u64) -> SimConfig {
    SimConfig {
        max_jobs,
        seed: Some(42),
        runtime_budget: None,
        ..SimConfig::default()
    }
}

/// What a scripted worker does with an allotment. `None` makes the worker
/// vanish without replying.
pub type Script = Box<dyn FnMut(SimTime) -> Option<(Decision, SimTime)>>;

struct ScriptedWorker {
    job: u64,
    script: Script,
}

/// In-process transport whose workers follow per-job scripts.
pub struct ScriptedTransport {
    workers: SlotMap<WorkerHandle, ScriptedWorker>,
    make_script: Box<dyn FnMut(u64) -> Script>,
    pending: Option<Reply>,
    exits: Vec<WorkerExit>,
    spawned: u64,
    /// Number of upcoming spawns that fail.
    pub fail_spawns: usize,
    /// Every request sent, in order, tagged with the worker's spawn index.
    pub sent: Vec<(u64, Request)>,
}

impl ScriptedTransport {
    pub fn new(make_script: impl FnMut(u64) -> Script + 'static) -> Self {
        Self {
            workers: SlotMap::with_key(),
            make_script: Box::new(make_script),
            pending: None,
            exits: Vec::new(),
            spawned: 0,
            fail_spawns: 0,
            sent: Vec::new(),
        }
    }

    /// Every worker answers every dispatch the same way.
    pub fn uniform(reply: impl Fn(SimTime) -> (Decision, SimTime) + Clone + 'static) -> Self {
        Self::new(move |_| {
            let reply = reply.clone();
            Box::new(move |allotment| Some(reply(allotment)))
        })
    }

    pub fn dispatches(&self) -> usize {
        self.sent.iter().filter(|(_, r)| !r.is_stop()).count()
    }

    pub fn stops_sent(&self) -> usize {
        self.sent.iter().filter(|(_, r)| r.is_stop()).count()
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Kill a worker outside of any dispatch, as if it died on its own.
    pub fn crash(&mut self, handle: WorkerHandle) {
        self.exit(handle, ExitStatus::Crashed);
    }

    fn exit(&mut self, handle: WorkerHandle, status: ExitStatus) {
        self.workers.remove(handle);
        self.exits.push(WorkerExit { handle, status });
    }
}

impl Transport for ScriptedTransport {
    fn spawn(&mut self) -> Result<WorkerHandle, TransportError> {
        if self.fail_spawns > 0 {
            self.fail_spawns -= 1;
            return Err(TransportError::Spawn(io::Error::other("scripted spawn failure")));
        }
        let job = self.spawned;
        self.spawned += 1;
        let script = (self.make_script)(job);
        Ok(self.workers.insert(ScriptedWorker { job, script }))
    }

    fn send(&mut self, to: WorkerHandle, request: Request) -> Result<(), TransportError> {
        let worker = self
            .workers
            .get_mut(to)
            .ok_or(TransportError::UnknownWorker(to))?;
        self.sent.push((worker.job, request));

        if request.is_stop() {
            self.exit(to, ExitStatus::Clean);
            return Ok(());
        }

        match (worker.script)(request.allotment) {
            Some((decision, used)) => {
                self.pending = Some(Reply {
                    sender: to,
                    decision,
                    used,
                });
                if decision == Decision::Terminated {
                    self.exit(to, ExitStatus::Clean);
                }
            }
            None => self.exit(to, ExitStatus::Crashed),
        }
        Ok(())
    }

    fn receive(&mut self, from: WorkerHandle) -> Result<Reply, TransportError> {
        match self.pending.take() {
            Some(reply) if reply.sender == from => Ok(reply),
            _ => Err(TransportError::WorkerGone(from)),
        }
    }

    fn reap(&mut self) -> Vec<WorkerExit> {
        std::mem::take(&mut self.exits)
    }
}
