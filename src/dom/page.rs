use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::{
    extraction::PROCESSED_ATTR,
    surface::{Slot, Surface, SurfaceError},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSpec {
    pub id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    /// Offset from the top of the document.
    pub top: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostHandle(String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilityChange {
    pub post: String,
    pub hidden: bool,
}

#[derive(Debug)]
struct PostNode {
    source: PostSpec,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
}

#[derive(Debug)]
struct PageState {
    pathname: String,
    viewport_height: f64,
    scroll_offset: f64,
    container_mounted: bool,
    posts: Vec<PostNode>,
}

#[derive(Clone)]
pub struct Page {
    state: Arc<Mutex<PageState>>,
    changes: Option<mpsc::UnboundedSender<VisibilityChange>>,
}

impl Page {
    pub fn new(pathname: &str, viewport_height: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState {
                pathname: pathname.to_string(),
                viewport_height,
                scroll_offset: 0.0,
                container_mounted: false,
                posts: Vec::new(),
            })),
            changes: None,
        }
    }

    pub fn with_change_feed(
        pathname: &str,
        viewport_height: f64,
    ) -> (Self, mpsc::UnboundedReceiver<VisibilityChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut page = Self::new(pathname, viewport_height);
        page.changes = Some(tx);
        (page, rx)
    }

    pub fn navigate(&self, pathname: &str) {
        self.state.lock().pathname = pathname.to_string();
    }

    pub fn mount_container(&self) {
        self.state.lock().container_mounted = true;
    }

    pub fn scroll_to(&self, offset: f64) {
        self.state.lock().scroll_offset = offset;
    }

    pub fn resize(&self, viewport_height: f64) {
        self.state.lock().viewport_height = viewport_height;
    }

    /// Appends posts; an id already on the page replaces the old node.
    pub fn add_posts(&self, posts: Vec<PostSpec>) {
        let mut state = self.state.lock();
        for source in posts {
            state.posts.retain(|node| node.source.id != source.id);
            state.posts.push(PostNode {
                source,
                attributes: BTreeMap::new(),
                style: BTreeMap::new(),
            });
        }
    }

    pub fn remove_posts(&self, ids: &[String]) {
        self.state
            .lock()
            .posts
            .retain(|node| !ids.contains(&node.source.id));
    }

    pub fn style(&self, id: &str, property: &str) -> Option<String> {
        self.state
            .lock()
            .posts
            .iter()
            .find(|node| node.source.id == id)
            .and_then(|node| node.style.get(property).cloned())
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.state
            .lock()
            .posts
            .iter()
            .any(|node| {
                node.source.id == id
                    && node.attributes.get(PROCESSED_ATTR).map(String::as_str) == Some("true")
            })
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.style(id, "visibility").as_deref() == Some("hidden")
    }

    fn with_node<T>(
        &self,
        post: &PostHandle,
        f: impl FnOnce(&mut PostNode) -> T,
    ) -> Result<T, SurfaceError> {
        let mut state = self.state.lock();
        state
            .posts
            .iter_mut()
            .find(|node| node.source.id == post.0)
            .map(f)
            .ok_or_else(|| SurfaceError::Detached(post.0.clone()))
    }

    fn read_node<T>(&self, post: &PostHandle, f: impl FnOnce(&PostNode) -> T) -> Option<T> {
        let state = self.state.lock();
        state.posts.iter().find(|node| node.source.id == post.0).map(f)
    }

    fn notify(&self, change: VisibilityChange) {
        if let Some(tx) = &self.changes {
            let _ = tx.send(change);
        }
    }
}

impl Surface for Page {
    type Post = PostHandle;

    fn pathname(&self) -> String {
        self.state.lock().pathname.clone()
    }

    fn viewport_height(&self) -> f64 {
        self.state.lock().viewport_height
    }

    fn has_timeline_container(&self) -> bool {
        self.state.lock().container_mounted
    }

    fn posts(&self) -> Vec<PostHandle> {
        self.state
            .lock()
            .posts
            .iter()
            .map(|node| PostHandle(node.source.id.clone()))
            .collect()
    }

    fn post_id(&self, post: &PostHandle) -> String {
        post.0.clone()
    }

    fn bounding_top(&self, post: &PostHandle) -> f64 {
        let scroll = self.state.lock().scroll_offset;
        self.read_node(post, |node| node.source.top - scroll)
            .unwrap_or(f64::INFINITY)
    }

    fn slot_text(&self, post: &PostHandle, slot: Slot) -> Option<String> {
        self.read_node(post, |node| match slot {
            Slot::Text => node.source.text.clone(),
            Slot::Author => node.source.author.clone(),
        })
        .flatten()
    }

    fn attribute(&self, post: &PostHandle, name: &str) -> Option<String> {
        self.read_node(post, |node| node.attributes.get(name).cloned())
            .flatten()
    }

    fn set_attribute(
        &self,
        post: &PostHandle,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), SurfaceError> {
        self.with_node(post, |node| match value {
            Some(value) => {
                node.attributes.insert(name.to_string(), value.to_string());
            }
            None => {
                node.attributes.remove(name);
            }
        })
    }

    fn set_style(
        &self,
        post: &PostHandle,
        property: &str,
        value: &str,
    ) -> Result<(), SurfaceError> {
        let flipped = self.with_node(post, |node| {
            let was_hidden = node.style.get("visibility").map(String::as_str) == Some("hidden");
            if value.is_empty() {
                node.style.remove(property);
            } else {
                node.style.insert(property.to_string(), value.to_string());
            }
            let hidden = node.style.get("visibility").map(String::as_str) == Some("hidden");
            (was_hidden != hidden).then_some(hidden)
        })?;

        if let Some(hidden) = flipped {
            self.notify(VisibilityChange {
                post: post.0.clone(),
                hidden,
            });
        }
        Ok(())
    }
}
