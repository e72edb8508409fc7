use std::{sync::Arc, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{sleep_until, timeout, Instant},
};

use crate::{
    ai::Classifier,
    dom::{extraction, surface::TIMELINE_SELECTOR, Surface},
    infrastructure::shutdown::ShutdownListener,
    tasks::processor::{PassSummary, TimelineProcessor},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    StructureChanged,
    Scrolled,
    Navigated,
    SettingsUpdated,
}

/// Leading-edge rate limiter with a single trailing run.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_fire: Option<Instant>,
    trailing: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fire: None,
            trailing: false,
        }
    }

    /// True when the caller may run now; otherwise one trailing run is owed.
    pub fn request(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now < last + self.interval => {
                self.trailing = true;
                false
            }
            _ => {
                self.mark_fired(now);
                true
            }
        }
    }

    pub fn mark_fired(&mut self, now: Instant) {
        self.last_fire = Some(now);
        self.trailing = false;
    }

    pub fn trailing_deadline(&self) -> Option<Instant> {
        match (self.trailing, self.last_fire) {
            (true, Some(last)) => Some(last + self.interval),
            _ => None,
        }
    }

    pub fn cancel_trailing(&mut self) {
        self.trailing = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Detached,
    AwaitingContainer,
    Attached,
}

pub struct ChangeScheduler<S: Surface, C: Classifier> {
    processor: Arc<TimelineProcessor<S, C>>,
    target_path: String,
    throttle: Throttle,
    observers: ObserverState,
    passes: JoinSet<PassSummary>,
}

impl<S: Surface, C: Classifier> ChangeScheduler<S, C> {
    pub fn new(
        processor: Arc<TimelineProcessor<S, C>>,
        throttle_interval: Duration,
        target_path: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            target_path: target_path.into(),
            throttle: Throttle::new(throttle_interval),
            observers: ObserverState::Detached,
            passes: JoinSet::new(),
        }
    }

    pub fn observers(&self) -> ObserverState {
        self.observers
    }

    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<PageEvent>,
        mut shutdown: ShutdownListener,
    ) {
        if self.processor.context().settings().should_run() {
            self.start();
        }

        loop {
            let trailing = self.throttle.trailing_deadline();
            tokio::select! {
                _ = shutdown.notified() => break,
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = wait_for_deadline(trailing) => {
                    self.throttle.mark_fired(Instant::now());
                    if self.is_active() {
                        self.spawn_pass();
                    }
                }
                Some(joined) = self.passes.join_next(), if !self.passes.is_empty() => {
                    if let Err(err) = joined {
                        tracing::error!(target: "scheduler", error = %err, "pass task aborted");
                    }
                }
            }
        }

        self.drain().await;
        tracing::info!(target: "scheduler", "scheduler stopped");
    }

    pub async fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::SettingsUpdated => self.on_settings_updated().await,
            PageEvent::Navigated => {
                if !self.processor.context().settings().should_run() {
                    return;
                }
                if self.observers == ObserverState::Detached {
                    self.start();
                } else {
                    self.request_pass();
                }
            }
            PageEvent::StructureChanged => match self.observers {
                ObserverState::Detached => {}
                ObserverState::AwaitingContainer => {
                    if self.processor.surface().has_timeline_container() {
                        self.observers = ObserverState::Attached;
                        tracing::info!(target: "scheduler", "timeline container found; observing");
                        self.request_pass();
                    }
                }
                ObserverState::Attached => self.request_pass(),
            },
            PageEvent::Scrolled => {
                if self.observers != ObserverState::Detached {
                    self.request_pass();
                }
            }
        }
    }

    async fn on_settings_updated(&mut self) {
        let settings = match self.processor.context().refresh_settings().await {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(target: "scheduler", error = %err, "could not re-read settings");
                return;
            }
        };

        if settings.should_run() {
            self.start();
        } else if !settings.is_enabled {
            let restored = extraction::restore_all(self.processor.surface());
            self.observers = ObserverState::Detached;
            self.throttle.cancel_trailing();
            tracing::info!(target: "scheduler", restored, "filter disabled; posts restored");
        }
    }

    /// Attaches observers (once) and runs a pass right away.
    fn start(&mut self) {
        if !self.on_target_view() {
            tracing::info!(
                target: "scheduler",
                path = %self.processor.surface().pathname(),
                "not on the target timeline; filter inactive"
            );
            return;
        }

        if self.observers == ObserverState::Detached {
            self.observers = if self.processor.surface().has_timeline_container() {
                ObserverState::Attached
            } else {
                tracing::info!(
                    target: "scheduler",
                    selector = TIMELINE_SELECTOR,
                    "waiting for timeline container"
                );
                ObserverState::AwaitingContainer
            };
        }

        self.throttle.mark_fired(Instant::now());
        self.spawn_pass();
    }

    fn request_pass(&mut self) {
        if !self.is_active() {
            return;
        }
        if self.throttle.request(Instant::now()) {
            self.spawn_pass();
        }
    }

    fn is_active(&self) -> bool {
        self.observers != ObserverState::Detached
            && self.on_target_view()
            && self.processor.context().settings().should_run()
    }

    fn on_target_view(&self) -> bool {
        self.processor.surface().pathname() == self.target_path
    }

    fn spawn_pass(&mut self) {
        let processor = self.processor.clone();
        self.passes.spawn(async move { processor.run_pass().await });
    }

    async fn drain(&mut self) {
        let bound = Duration::from_secs(5);
        let passes = &mut self.passes;
        let drained = timeout(bound, async {
            while let Some(joined) = passes.join_next().await {
                if let Err(err) = joined {
                    tracing::error!(target: "scheduler", error = %err, "pass task aborted");
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                target: "scheduler",
                "passes did not finish within {:?}; aborting them",
                bound
            );
            self.passes.abort_all();
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
