use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use rand::{SeedableRng, rngs::StdRng};
use slotmap::SlotMap;
use tracing::{debug, trace, warn};

use super::transport::{Decision, ExitStatus, Reply, Request, Transport, WorkerExit, WorkerHandle};
use super::worker;
use crate::error::TransportError;

/// How often a blocked `receive` checks whether its worker is still alive.
const LIVENESS_POLL: Duration = Duration::from_millis(50);

struct WorkerLink {
    requests: Sender<Request>,
    thread: JoinHandle<()>,
}

/// Runs every worker on its own OS thread.
///
/// Each worker owns a private request channel; all replies share one channel
/// back to the coordinator and are tagged with the sender's handle.
pub struct ThreadTransport {
    workers: SlotMap<WorkerHandle, WorkerLink>,
    replies_tx: Sender<Reply>,
    replies_rx: Receiver<Reply>,
    seed: Option<u64>,
    spawned: u64,
}

impl ThreadTransport {
    pub fn new(seed: Option<u64>) -> Self {
        let (replies_tx, replies_rx) = unbounded();
        Self {
            workers: SlotMap::with_key(),
            replies_tx,
            replies_rx,
            seed,
            spawned: 0,
        }
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    fn worker_rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(self.spawned)),
            None => StdRng::from_os_rng(),
        }
    }
}

impl Transport for ThreadTransport {
    fn spawn(&mut self) -> Result<WorkerHandle, TransportError> {
        let (requests, inbox) = unbounded();
        let replies = self.replies_tx.clone();
        let rng = self.worker_rng();
        let name = format!("worker-{}", self.spawned);

        let handle = self.workers.try_insert_with_key(|handle| {
            let thread = thread::Builder::new()
                .name(name)
                .spawn(move || worker_main(handle, inbox, replies, rng))?;
            Ok::<_, io::Error>(WorkerLink { requests, thread })
        })?;

        self.spawned += 1;
        debug!(worker = ?handle, "spawned worker thread");
        Ok(handle)
    }

    fn send(&mut self, to: WorkerHandle, request: Request) -> Result<(), TransportError> {
        let link = self
            .workers
            .get(to)
            .ok_or(TransportError::UnknownWorker(to))?;
        link.requests
            .send(request)
            .map_err(|_| TransportError::Send(to))
    }

    fn receive(&mut self, from: WorkerHandle) -> Result<Reply, TransportError> {
        loop {
            match self.replies_rx.recv_timeout(LIVENESS_POLL) {
                Ok(reply) if reply.sender == from => return Ok(reply),
                Ok(reply) => {
                    warn!(expected = ?from, got = ?reply.sender, "dropping reply from another worker");
                }
                Err(RecvTimeoutError::Timeout) => {
                    let gone = self
                        .workers
                        .get(from)
                        .is_none_or(|link| link.thread.is_finished());
                    // A finished worker's last reply is already queued if it sent one.
                    if gone && self.replies_rx.is_empty() {
                        return Err(TransportError::WorkerGone(from));
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Disconnected),
            }
        }
    }

    fn reap(&mut self) -> Vec<WorkerExit> {
        let finished: Vec<WorkerHandle> = self
            .workers
            .iter()
            .filter(|(_, link)| link.thread.is_finished())
            .map(|(handle, _)| handle)
            .collect();

        finished
            .into_iter()
            .filter_map(|handle| {
                let link = self.workers.remove(handle)?;
                let status = match link.thread.join() {
                    Ok(()) => ExitStatus::Clean,
                    Err(_) => ExitStatus::Crashed,
                };
                Some(WorkerExit { handle, status })
            })
            .collect()
    }

    fn release(&mut self) {
        for (handle, link) in self.workers.drain() {
            // Dropping the sender unblocks a worker still waiting for work.
            drop(link.requests);
            if link.thread.join().is_err() {
                warn!(worker = ?handle, "worker panicked during shutdown");
            }
        }
    }
}

impl Drop for ThreadTransport {
    fn drop(&mut self) {
        self.release();
    }
}

fn worker_main(
    me: WorkerHandle,
    inbox: Receiver<Request>,
    replies: Sender<Reply>,
    mut rng: StdRng,
) {
    while let Ok(request) = inbox.recv() {
        let Some((decision, used)) = worker::respond(request.allotment, &mut rng) else {
            trace!(worker = ?me, "stop directive received");
            break;
        };
        trace!(worker = ?me, ?decision, %used, allotment = %request.allotment, "replying");

        if replies
            .send(Reply {
                sender: me,
                decision,
                used,
            })
            .is_err()
        {
            break;
        }
        if decision == Decision::Terminated {
            break;
        }
    }
}
