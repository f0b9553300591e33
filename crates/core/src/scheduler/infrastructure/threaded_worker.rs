use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::scheduler::domain::periodic_task::{CancelToken, PeriodicTask, TickContext};
use crate::shared::constants::MIN_WORKER_SLEEP_SECS;

/// Runs one periodic task on a dedicated thread.
///
/// The thread sleeps `max(min_sleep, interval - last_tick_duration)` between
/// ticks by waiting on a wake channel, so `stop` interrupts the sleep instead
/// of waiting it out. `stop` joins the thread and hands the task back.
///
/// A panicking tick ends the loop; `on_stop` still runs and `stop` reports
/// the panic instead of returning the task.
pub struct ThreadedWorker {
    name: String,
    cancel: CancelToken,
    wake_tx: Sender<()>,
    handle: Option<JoinHandle<Option<WorkerExit>>>,
}

struct WorkerExit {
    task: Box<dyn PeriodicTask>,
    panic: Option<String>,
}

impl ThreadedWorker {
    /// Starts a thread for `task`. If the thread cannot be created the task
    /// is handed back alongside the error.
    pub fn spawn(
        task: Box<dyn PeriodicTask>,
    ) -> Result<Self, (std::io::Error, Box<dyn PeriodicTask>)> {
        let name = task.name().to_string();
        let cancel = CancelToken::new();
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded::<Box<dyn PeriodicTask>>(1);

        let thread_cancel = cancel.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("{name}-worker"))
            .spawn(move || {
                let task = task_rx.recv().ok()?;
                Some(run_loop(task, thread_cancel, wake_rx))
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => return Err((e, task)),
        };
        if let Err(returned) = task_tx.send(task) {
            let _ = handle.join();
            let e = std::io::Error::other(format!("{name} worker exited before starting"));
            return Err((e, returned.into_inner()));
        }

        log::info!("Started {name} worker thread");
        Ok(Self {
            name,
            cancel,
            wake_tx,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Requests a stop without waiting for the thread.
    pub fn request_stop(&self) {
        self.cancel.cancel();
        let _ = self.wake_tx.try_send(());
    }

    /// Stops the thread and returns the task once it has quiesced.
    ///
    /// Returns `Ok(None)` when the worker was already stopped.
    pub fn stop(&mut self) -> Result<Option<Box<dyn PeriodicTask>>, Box<dyn std::error::Error>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        log::info!("Stopping {} worker thread", self.name);
        self.request_stop();
        match handle.join() {
            Ok(Some(WorkerExit { panic: Some(reason), .. })) => {
                Err(format!("{} worker thread panicked: {reason}", self.name).into())
            }
            Ok(exit) => Ok(exit.map(|exit| exit.task)),
            Err(_) => Err(format!("{} worker thread panicked", self.name).into()),
        }
    }
}

impl Drop for ThreadedWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("{e}");
        }
    }
}

fn run_loop(
    mut task: Box<dyn PeriodicTask>,
    cancel: CancelToken,
    wake_rx: Receiver<()>,
) -> WorkerExit {
    let min_sleep = Duration::from_secs_f64(MIN_WORKER_SLEEP_SECS);
    task.on_start();

    let mut failure = None;
    let mut previous = Instant::now();
    while !cancel.is_cancelled() {
        let started = Instant::now();
        let ctx = TickContext {
            delta: started - previous,
            cancel: &cancel,
        };
        previous = started;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.tick(&ctx))) {
            let reason = panic_reason(payload.as_ref());
            log::error!("{} task panicked: {reason}", task.name());
            failure = Some(reason);
            break;
        }

        let sleep = task.interval().saturating_sub(started.elapsed()).max(min_sleep);
        match wake_rx.recv_timeout(sleep) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    task.on_stop();
    log::info!("{} worker thread exited", task.name());
    WorkerExit {
        task,
        panic: failure,
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
