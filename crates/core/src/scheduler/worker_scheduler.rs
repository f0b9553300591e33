use std::time::Duration;

use crate::scheduler::domain::periodic_task::{CancelToken, PeriodicTask, TickContext};
use crate::scheduler::domain::renderer::{PreviewSink, RendererArena};
use crate::scheduler::infrastructure::threaded_worker::ThreadedWorker;

/// How activated tasks are driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One dedicated thread per task.
    Threaded,
    /// Ticked from the host loop through [`WorkerScheduler::pump`].
    Cooperative,
}

impl ExecutionMode {
    /// Threaded when the platform reports more than one hardware thread.
    pub fn detect() -> Self {
        match std::thread::available_parallelism() {
            Ok(n) if n.get() > 1 => ExecutionMode::Threaded,
            _ => ExecutionMode::Cooperative,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

struct CooperativeTask {
    task: Box<dyn PeriodicTask>,
    cancel: CancelToken,
    until_refresh: Duration,
    since_tick: Duration,
}

enum Slot {
    Idle(Box<dyn PeriodicTask>),
    Threaded(ThreadedWorker),
    Cooperative(CooperativeTask),
    /// The task was lost to a worker panic.
    Vacant,
}

/// Owns named periodic tasks and the debug renderers attached to them.
///
/// `activate` starts every idle task; `stop` quiesces them and returns each
/// task to idle so a later `activate` restarts it. Both are idempotent.
pub struct WorkerScheduler {
    mode: ExecutionMode,
    slots: Vec<Slot>,
    renderers: RendererArena,
}

impl WorkerScheduler {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            slots: Vec::new(),
            renderers: RendererArena::new(),
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Registers a task. It starts on the next `activate`.
    pub fn add_task(&mut self, task: Box<dyn PeriodicTask>) -> TaskId {
        self.slots.push(Slot::Idle(task));
        TaskId(self.slots.len() - 1)
    }

    pub fn activate(&mut self) {
        let mode = self.mode;
        for slot in &mut self.slots {
            let Slot::Idle(_) = slot else {
                continue;
            };
            let Slot::Idle(task) = std::mem::replace(slot, Slot::Vacant) else {
                continue;
            };
            *slot = start(task, mode);
        }
    }

    /// Stops every running task and waits for threaded workers to exit.
    ///
    /// All tasks are stopped even if one fails; the first failure is returned.
    pub fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut first_error: Option<Box<dyn std::error::Error>> = None;

        for slot in &mut self.slots {
            *slot = match std::mem::replace(slot, Slot::Vacant) {
                Slot::Threaded(mut worker) => match worker.stop() {
                    Ok(Some(task)) => Slot::Idle(task),
                    Ok(None) => Slot::Vacant,
                    Err(e) => {
                        log::error!("{e}");
                        first_error.get_or_insert(e);
                        Slot::Vacant
                    }
                },
                Slot::Cooperative(mut coop) => {
                    log::info!("Stopping {} task", coop.task.name());
                    coop.cancel.cancel();
                    coop.task.on_stop();
                    Slot::Idle(coop.task)
                }
                other => other,
            };
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Advances cooperative tasks by one host frame. Each task ticks once
    /// its time-until-refresh budget is spent, receiving the wall time
    /// accumulated since its previous tick.
    pub fn pump(&mut self, host_delta: Duration) {
        for slot in &mut self.slots {
            let Slot::Cooperative(coop) = slot else {
                continue;
            };
            coop.since_tick += host_delta;
            if coop.until_refresh > host_delta {
                coop.until_refresh -= host_delta;
                continue;
            }
            let ctx = TickContext {
                delta: coop.since_tick,
                cancel: &coop.cancel,
            };
            coop.task.tick(&ctx);
            coop.since_tick = Duration::ZERO;
            coop.until_refresh = coop.task.interval();
        }
    }

    pub fn is_running(&self, id: TaskId) -> bool {
        match self.slots.get(id.0) {
            Some(Slot::Threaded(worker)) => worker.is_running(),
            Some(Slot::Cooperative(_)) => true,
            _ => false,
        }
    }

    pub fn has_cooperative_tasks(&self) -> bool {
        self.slots.iter().any(|s| matches!(s, Slot::Cooperative(_)))
    }

    pub fn renderers(&self) -> &RendererArena {
        &self.renderers
    }

    pub fn renderers_mut(&mut self) -> &mut RendererArena {
        &mut self.renderers
    }

    pub fn render_all(&mut self, sink: &mut dyn PreviewSink) {
        self.renderers.render_all(sink);
    }
}

impl Drop for WorkerScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::error!("Scheduler teardown: {e}");
        }
    }
}

fn start(task: Box<dyn PeriodicTask>, mode: ExecutionMode) -> Slot {
    let mut task = task;
    if mode == ExecutionMode::Threaded {
        match ThreadedWorker::spawn(task) {
            Ok(worker) => return Slot::Threaded(worker),
            Err((e, returned)) => {
                log::warn!("Could not start {} worker thread: {e}", returned.name());
                task = returned;
            }
        }
    }
    log::warn!("Running {} task cooperatively", task.name());
    task.on_start();
    Slot::Cooperative(CooperativeTask {
        task,
        cancel: CancelToken::new(),
        until_refresh: Duration::ZERO,
        since_tick: Duration::ZERO,
    })
}
