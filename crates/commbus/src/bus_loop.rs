//! # Bus Loop
//!
//! Publishing on a pipe runs every callback on the publisher's thread, so all
//! bus activity has to come from one logical thread. Asynchronous producers
//! (backend I/O tasks, timers) never publish directly; they post a [`Job`]
//! through a [`BusHandle`] and the single consumer task spawned by
//! [`BusLoop::spawn`] runs it against the shared [`CommContext`].

use commbus_comm_core::CommContext;
use commbus_infra_common::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Work executed on the bus
pub type Job = Box<dyn FnOnce(&Arc<CommContext>) + Send + 'static>;

enum Command {
    Run(Job),
    Shutdown,
}

/// Cloneable sender side of the bus loop
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::UnboundedSender<Command>,
    pending_timers: Arc<AtomicUsize>,
}

impl BusHandle {
    /// Queue a job; `false` once the loop has stopped
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce(&Arc<CommContext>) + Send + 'static,
    {
        self.tx.send(Command::Run(Box::new(job))).is_ok()
    }

    /// Run `job` on the bus and wait for its result
    pub async fn call<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce(&Arc<CommContext>) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let queued = self.post(move |ctx| {
            if tx.send(job(ctx)).is_err() {
                debug!("Caller stopped waiting for a bus job");
            }
        });
        if !queued {
            return Err(Error::Internal("bus loop is not running".into()));
        }
        rx.await
            .map_err(|_| Error::Internal("bus loop stopped before running the job".into()))
    }

    /// Queue a job after `delay`. Must be called from within a tokio runtime.
    pub fn post_after<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce(&Arc<CommContext>) + Send + 'static,
    {
        let handle = self.clone();
        self.pending_timers.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.pending_timers.fetch_sub(1, Ordering::SeqCst);
            if !handle.post(job) {
                debug!("Bus loop stopped before a delayed job became due");
            }
        });
    }

    /// Number of delayed jobs not yet queued
    pub fn pending_timers(&self) -> usize {
        self.pending_timers.load(Ordering::SeqCst)
    }

    /// Ask the loop to stop after the jobs queued before this call
    pub fn shutdown(&self) {
        if self.tx.send(Command::Shutdown).is_err() {
            debug!("Bus loop already stopped");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The single consumer of posted jobs
pub struct BusLoop {
    ctx: Arc<CommContext>,
    rx: mpsc::UnboundedReceiver<Command>,
}

impl BusLoop {
    /// Spawn the loop on the current tokio runtime.
    ///
    /// The join handle resolves to the number of jobs that were run.
    pub fn spawn(ctx: Arc<CommContext>) -> (BusHandle, JoinHandle<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = BusHandle {
            tx,
            pending_timers: Arc::new(AtomicUsize::new(0)),
        };
        let task = tokio::spawn(BusLoop { ctx, rx }.run());
        (handle, task)
    }

    async fn run(mut self) -> usize {
        info!("Bus loop started");
        let mut processed = 0;
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Run(job) => {
                    job(&self.ctx);
                    processed += 1;
                }
                Command::Shutdown => break,
            }
        }
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Bus loop stopped with {} queued jobs not run", dropped);
        }
        info!("Bus loop stopped after {} jobs", processed);
        processed
    }
}
