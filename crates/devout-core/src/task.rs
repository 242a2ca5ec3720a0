//! Per-period soundcard tasks and the launchers that run them.
//!
//! After every hardware period a backend hands three tasks to its launcher,
//! in this order: `tic-device`, `clear-buffer`, `switch-buffer-flag`. The
//! launcher must run them in submission order before the next period.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

use crate::soundcard::Soundcard;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    TicDevice,
    ClearBuffer,
    SwitchBufferFlag,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::TicDevice => "tic-device",
            TaskKind::ClearBuffer => "clear-buffer",
            TaskKind::SwitchBufferFlag => "switch-buffer-flag",
        }
    }
}

#[derive(Clone)]
pub struct SoundcardTask {
    kind: TaskKind,
    soundcard: Arc<dyn Soundcard>,
}

impl SoundcardTask {
    pub fn new(kind: TaskKind, soundcard: Arc<dyn Soundcard>) -> Self {
        Self { kind, soundcard }
    }

    /// The three tasks issued after one period, in order.
    pub fn period(soundcard: Arc<dyn Soundcard>) -> Vec<SoundcardTask> {
        vec![
            Self::new(TaskKind::TicDevice, soundcard.clone()),
            Self::new(TaskKind::ClearBuffer, soundcard.clone()),
            Self::new(TaskKind::SwitchBufferFlag, soundcard),
        ]
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn launch(&self) {
        match self.kind {
            TaskKind::TicDevice => self.soundcard.tic(),
            TaskKind::ClearBuffer => self.soundcard.clear_buffer(),
            TaskKind::SwitchBufferFlag => self.soundcard.switch_buffer_flag(),
        }
    }
}

impl core::fmt::Debug for SoundcardTask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SoundcardTask")
            .field("name", &self.name())
            .finish()
    }
}

/// Accepts batches of tasks. Must not block on their execution.
pub trait TaskLauncher: Send + Sync {
    fn add_tasks(&self, tasks: Vec<SoundcardTask>);
}

/// Runs tasks on the calling thread, immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineLauncher;

impl TaskLauncher for InlineLauncher {
    fn add_tasks(&self, tasks: Vec<SoundcardTask>) {
        for task in &tasks {
            task.launch();
        }
    }
}

enum LauncherCommand {
    Run(Vec<SoundcardTask>),
    Shutdown,
}

/// Runs tasks on a dedicated worker thread, in submission order.
pub struct ThreadLauncher {
    tx: Sender<LauncherCommand>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadLauncher {
    pub fn start() -> Result<Self> {
        let (tx, rx) = unbounded::<LauncherCommand>();

        let thread = std::thread::Builder::new()
            .name("devout-task-launcher".into())
            .spawn(move || {
                while let Ok(command) = rx.recv() {
                    match command {
                        LauncherCommand::Run(tasks) => {
                            for task in &tasks {
                                task.launch();
                            }
                        }
                        LauncherCommand::Shutdown => break,
                    }
                }
                tracing::debug!("Task launcher thread exited");
            })
            .map_err(|e| Error::TaskLauncher(format!("Failed to spawn launcher thread: {}", e)))?;

        Ok(Self {
            tx,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Stop the worker after it drains queued tasks, and wait for it.
    ///
    /// Called from the worker itself (the last soundcard reference dropped
    /// by a queued task), the worker is detached instead of joined.
    pub fn shutdown(&self) {
        let _ = self.tx.send(LauncherCommand::Shutdown);
        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == std::thread::current().id() {
            tracing::debug!("Task launcher dropped on its own worker, detaching");
            return;
        }
        if handle.join().is_err() {
            tracing::warn!("Task launcher thread panicked");
        }
    }
}

impl TaskLauncher for ThreadLauncher {
    fn add_tasks(&self, tasks: Vec<SoundcardTask>) {
        if self.tx.send(LauncherCommand::Run(tasks)).is_err() {
            tracing::warn!("Task launcher is shut down, dropping tasks");
        }
    }
}

impl Drop for ThreadLauncher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
