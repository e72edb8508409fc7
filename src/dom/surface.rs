use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Text,
    Author,
}

impl Slot {
    pub fn selector(self) -> &'static str {
        match self {
            Slot::Text => r#"div[data-testid="tweetText"]"#,
            Slot::Author => r#"div[data-testid="User-Name"] div"#,
        }
    }
}

pub const TIMELINE_SELECTOR: &str = r#"div[data-testid="primaryColumn"]"#;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("post {0} is no longer attached to the page")]
    Detached(String),
}

/// The rendering surface the pipeline reads from and mutates.
///
/// Positions are viewport-relative, like `getBoundingClientRect().top`.
/// Setting a style to the empty string unsets it.
pub trait Surface: Send + Sync + 'static {
    type Post: Clone + Send + Sync + 'static;

    fn pathname(&self) -> String;
    fn viewport_height(&self) -> f64;
    fn has_timeline_container(&self) -> bool;

    fn posts(&self) -> Vec<Self::Post>;
    fn post_id(&self, post: &Self::Post) -> String;
    fn bounding_top(&self, post: &Self::Post) -> f64;
    fn slot_text(&self, post: &Self::Post, slot: Slot) -> Option<String>;

    fn attribute(&self, post: &Self::Post, name: &str) -> Option<String>;
    fn set_attribute(
        &self,
        post: &Self::Post,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), SurfaceError>;
    fn set_style(&self, post: &Self::Post, property: &str, value: &str)
        -> Result<(), SurfaceError>;
}
