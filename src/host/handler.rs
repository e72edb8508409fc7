use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::{
    context::FilterContext,
    dom::Page,
    domain::{settings, SettingsError},
    stats::TimeSaved,
    tasks::PageEvent,
};

use super::protocol::{HostMessage, HostOutput};

pub struct HostHandler {
    page: Page,
    context: Arc<FilterContext>,
    events: mpsc::Sender<PageEvent>,
}

impl HostHandler {
    pub fn new(page: Page, context: Arc<FilterContext>, events: mpsc::Sender<PageEvent>) -> Self {
        Self {
            page,
            context,
            events,
        }
    }

    /// Handles one raw input line. Bad input is answered, never fatal.
    pub async fn handle_line(&self, line: &str) -> Option<HostOutput> {
        let message = match serde_json::from_str::<HostMessage>(line) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(target: "host", error = %err, "ignoring malformed input line");
                return Some(HostOutput::Error {
                    message: format!("malformed message: {err}"),
                });
            }
        };

        match self.handle(message).await {
            Ok(output) => output,
            Err(err) => {
                tracing::error!(target: "host", error = %err, "failed to handle message");
                Some(HostOutput::Error {
                    message: err.to_string(),
                })
            }
        }
    }

    pub async fn handle(&self, message: HostMessage) -> Result<Option<HostOutput>> {
        match message {
            HostMessage::Navigated { path } => {
                self.page.navigate(&path);
                self.emit(PageEvent::Navigated).await?;
            }
            HostMessage::ContainerMounted => {
                self.page.mount_container();
                self.emit(PageEvent::StructureChanged).await?;
            }
            HostMessage::PostsAdded { posts } => {
                self.page.add_posts(posts);
                self.emit(PageEvent::StructureChanged).await?;
            }
            HostMessage::PostsRemoved { ids } => {
                self.page.remove_posts(&ids);
                self.emit(PageEvent::StructureChanged).await?;
            }
            HostMessage::Scrolled { offset } => {
                self.page.scroll_to(offset);
                self.emit(PageEvent::Scrolled).await?;
            }
            HostMessage::Viewport { height } => {
                self.page.resize(height);
                self.emit(PageEvent::Scrolled).await?;
            }
            HostMessage::SettingsUpdated => self.emit(PageEvent::SettingsUpdated).await?,
            HostMessage::SaveSettings {
                api_key,
                filter_condition,
                is_enabled,
            } => {
                let kv = self.context.store();
                match settings::save_settings(kv.as_ref(), &api_key, &filter_condition, is_enabled)
                    .await
                {
                    Ok(()) => self.emit(PageEvent::SettingsUpdated).await?,
                    Err(SettingsError::Incomplete) => {
                        return Ok(Some(HostOutput::Error {
                            message: SettingsError::Incomplete.to_string(),
                        }))
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            HostMessage::SetEnabled { enabled } => {
                let kv = self.context.store();
                settings::set_enabled(kv.as_ref(), enabled).await?;
                self.emit(PageEvent::SettingsUpdated).await?;
            }
            HostMessage::Stats => {
                let snapshot = self.context.cache().snapshot();
                let saved = TimeSaved::from_classifications(&snapshot);
                return Ok(Some(HostOutput::Stats {
                    posts_filtered: saved.as_ref().map_or(0, |s| s.posts_filtered),
                    time_saved: saved.map(|s| s.display),
                }));
            }
        }
        Ok(None)
    }

    async fn emit(&self, event: PageEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .context("scheduler is no longer receiving page events")
    }
}
