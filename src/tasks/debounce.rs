use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{sleep_until, Instant},
};

pub type FlushAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Command {
    Schedule,
    Flush,
}

/// Coalesces repeated flush requests into one run of the action.
///
/// `schedule` (re)arms a quiet-period timer; `force_flush` runs the action
/// right away and disarms it. When every handle is dropped a still-armed
/// timer is flushed before the worker exits.
#[derive(Clone)]
pub struct FlushDebouncer {
    commands: mpsc::UnboundedSender<Command>,
}

impl FlushDebouncer {
    pub fn spawn(window: Duration, action: FlushAction) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(window, action, receiver));
        (Self { commands }, handle)
    }

    pub fn schedule(&self) {
        self.send(Command::Schedule);
    }

    pub fn force_flush(&self) {
        self.send(Command::Flush);
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::warn!(target: "cache", ?command, "flush worker is gone; request dropped");
        }
    }
}

async fn run_worker(
    window: Duration,
    action: FlushAction,
    mut receiver: mpsc::UnboundedReceiver<Command>,
) {
    let mut deadline: Option<Instant> = None;
    loop {
        let command = match deadline {
            Some(at) => tokio::select! {
                command = receiver.recv() => command,
                _ = sleep_until(at) => {
                    deadline = None;
                    action().await;
                    continue;
                }
            },
            None => receiver.recv().await,
        };

        match command {
            Some(Command::Schedule) => deadline = Some(Instant::now() + window),
            Some(Command::Flush) => {
                deadline = None;
                action().await;
            }
            None => {
                if deadline.is_some() {
                    action().await;
                }
                break;
            }
        }
    }
}
