use std::{sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use tokio::{
    io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};

use crate::{
    ai::OpenAiClassifier,
    cache::CachePolicy,
    config::AppConfig,
    context::FilterContext,
    db::{self, SqliteStore},
    dom::{Page, VisibilityChange},
    host::{HostHandler, HostOutput},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    tasks::{ChangeScheduler, TimelineProcessor},
};

const DEFAULT_VIEWPORT_HEIGHT: f64 = 900.0;
const EVENT_BUFFER: usize = 256;

pub struct FilterApp {
    _paths: ResolvedPaths,
    handler: HostHandler,
    context: Arc<FilterContext>,
    kv: Arc<SqliteStore>,
    scheduler_handle: JoinHandle<()>,
    changes: mpsc::UnboundedReceiver<VisibilityChange>,
    shutdown: Shutdown,
}

impl FilterApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.store_path).await?;
        let kv = Arc::new(SqliteStore::new(pool));

        let http_client = Client::builder()
            .user_agent(format!("tweet-filter-rust/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let classifier = Arc::new(OpenAiClassifier::new(http_client, config.openai.clone()));

        let policy = CachePolicy {
            debounce_window: config.pipeline.flush_debounce,
            flush_threshold: config.pipeline.flush_threshold,
        };
        let context = FilterContext::initialize(kv.clone(), policy).await;

        let (page, changes) = Page::with_change_feed("/", DEFAULT_VIEWPORT_HEIGHT);
        let processor = Arc::new(TimelineProcessor::new(
            Arc::new(page.clone()),
            classifier,
            context.clone(),
            config.pipeline.viewport_lookahead,
        ));
        let scheduler = ChangeScheduler::new(
            processor,
            config.pipeline.throttle_interval,
            config.pipeline.timeline_path.clone(),
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let scheduler_handle = tokio::spawn(scheduler.run(events_rx, shutdown.subscribe()));
        let handler = HostHandler::new(page, context.clone(), events_tx);

        Ok(Self {
            _paths: paths,
            handler,
            context,
            kv,
            scheduler_handle,
            changes,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let FilterApp {
            _paths: _,
            handler,
            context,
            kv,
            mut scheduler_handle,
            changes,
            shutdown,
        } = self;

        tracing::info!(target: "host", "timeline filter host started");

        let (outputs_tx, outputs_rx) = mpsc::unbounded_channel::<HostOutput>();
        let writer = tokio::spawn(write_outputs(outputs_rx));
        let forwarder = tokio::spawn(forward_changes(changes, outputs_tx.clone()));

        let mut shutdown_listener = shutdown.subscribe();
        let mut lines = BufReader::new(io::stdin()).lines();
        loop {
            tokio::select! {
                _ = shutdown_listener.notified() => {
                    tracing::info!(target: "host", "shutdown requested");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if let Some(output) = handler.handle_line(&line).await {
                            let _ = outputs_tx.send(output);
                        }
                    }
                    Ok(None) => {
                        tracing::info!(target: "host", "input closed");
                        break;
                    }
                    Err(err) => {
                        tracing::error!(target: "host", error = %err, "failed to read input");
                        break;
                    }
                }
            }
        }

        shutdown.trigger();
        drop(handler);

        let shutdown_timeout = Duration::from_secs(10);
        let scheduler_sleep = tokio::time::sleep(shutdown_timeout);
        tokio::pin!(scheduler_sleep);
        tokio::select! {
            res = &mut scheduler_handle => {
                if let Err(err) = res {
                    if err.is_panic() {
                        tracing::error!(target: "host", "scheduler task panicked");
                    }
                }
            }
            _ = &mut scheduler_sleep => {
                tracing::warn!(
                    target: "host",
                    "scheduler did not stop within {:?}; aborting",
                    shutdown_timeout
                );
                scheduler_handle.abort();
            }
        }

        context.shutdown().await;
        kv.close().await;

        // The page mirror is gone once the scheduler stops, which ends the feed.
        if timeout(Duration::from_secs(1), forwarder).await.is_err() {
            tracing::warn!(target: "host", "visibility feed did not close in time");
        }
        drop(outputs_tx);
        if timeout(Duration::from_secs(1), writer).await.is_err() {
            tracing::warn!(target: "host", "output writer did not drain in time");
        }

        tracing::info!(target: "host", "timeline filter host stopped");
        Ok(())
    }
}

async fn forward_changes(
    mut changes: mpsc::UnboundedReceiver<VisibilityChange>,
    outputs: mpsc::UnboundedSender<HostOutput>,
) {
    while let Some(change) = changes.recv().await {
        if outputs.send(HostOutput::from(change)).is_err() {
            break;
        }
    }
}

async fn write_outputs(mut outputs: mpsc::UnboundedReceiver<HostOutput>) {
    let mut stdout = io::stdout();
    while let Some(output) = outputs.recv().await {
        let mut line = match serde_json::to_string(&output) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(target: "host", error = %err, "failed to encode output");
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = stdout.write_all(line.as_bytes()).await {
            tracing::error!(target: "host", error = %err, "failed to write output");
            break;
        }
        let _ = stdout.flush().await;
    }
}
