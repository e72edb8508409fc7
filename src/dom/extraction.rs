use crate::domain::{Decision, PostContent};

use super::surface::{Slot, Surface, SurfaceError};

pub const PROCESSED_ATTR: &str = "data-processed";
const ARIA_HIDDEN: &str = "aria-hidden";

const COLLAPSE_STYLES: [(&str, &str); 7] = [
    ("visibility", "hidden"),
    ("min-height", "0"),
    ("height", "0"),
    ("margin", "0"),
    ("padding", "0"),
    ("overflow", "hidden"),
    (
        "transition",
        "height 0.2s ease-out, margin 0.2s ease-out, padding 0.2s ease-out",
    ),
];

pub fn is_processed<S: Surface>(surface: &S, post: &S::Post) -> bool {
    surface.attribute(post, PROCESSED_ATTR).as_deref() == Some("true")
}

/// Unprocessed posts within `lookahead` viewport heights, top to bottom.
///
/// Every returned post is already marked processed, so it is handed to the
/// pipeline at most once even if another pass lists posts before this one
/// resolves.
pub fn list_candidate_posts<S: Surface>(surface: &S, lookahead: f64) -> Vec<S::Post> {
    let limit = surface.viewport_height() * lookahead;
    let mut candidates: Vec<(f64, S::Post)> = surface
        .posts()
        .into_iter()
        .filter(|post| !is_processed(surface, post))
        .map(|post| (surface.bounding_top(&post), post))
        .filter(|(top, _)| *top <= limit)
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    candidates
        .into_iter()
        .filter_map(|(_, post)| match surface.set_attribute(&post, PROCESSED_ATTR, Some("true")) {
            Ok(()) => Some(post),
            Err(err) => {
                tracing::debug!(target: "dom", error = %err, "skipping candidate");
                None
            }
        })
        .collect()
}

pub fn extract<S: Surface>(surface: &S, post: &S::Post) -> PostContent {
    let read = |slot: Slot| match surface.slot_text(post, slot) {
        Some(text) => text.trim().to_string(),
        None => {
            tracing::trace!(target: "dom", slot = slot.selector(), "slot missing");
            String::new()
        }
    };
    PostContent {
        author: read(Slot::Author),
        text: read(Slot::Text),
    }
}

pub fn apply_decision<S: Surface>(
    surface: &S,
    post: &S::Post,
    decision: Decision,
) -> Result<(), SurfaceError> {
    if decision.is_keep() {
        return Ok(());
    }
    for (property, value) in COLLAPSE_STYLES {
        surface.set_style(post, property, value)?;
    }
    surface.set_attribute(post, ARIA_HIDDEN, Some("true"))
}

/// Undoes every collapse on processed posts. Returns how many were touched.
pub fn restore_all<S: Surface>(surface: &S) -> usize {
    let mut restored = 0;
    for post in surface.posts() {
        if !is_processed(surface, &post) {
            continue;
        }
        let result = COLLAPSE_STYLES
            .iter()
            .try_for_each(|(property, _)| surface.set_style(&post, property, ""))
            .and_then(|_| surface.set_attribute(&post, ARIA_HIDDEN, None));
        match result {
            Ok(()) => restored += 1,
            Err(err) => tracing::debug!(target: "dom", error = %err, "could not restore post"),
        }
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::page::{Page, PostSpec};

    fn post(id: &str, author: &str, text: &str, top: f64) -> PostSpec {
        PostSpec {
            id: id.to_string(),
            author: Some(author.to_string()),
            text: Some(text.to_string()),
            top,
        }
    }

    fn page_with(posts: Vec<PostSpec>) -> Page {
        let page = Page::new("/home", 800.0);
        page.add_posts(posts);
        page
    }

    #[test]
    fn candidates_are_ordered_filtered_and_marked() {
        let page = page_with(vec![
            post("far", "a", "far below", 5000.0),
            post("second", "a", "second", 400.0),
            post("first", "a", "first", 10.0),
            post("edge", "a", "edge", 1600.0),
        ]);

        let ids: Vec<String> = list_candidate_posts(&page, 2.0)
            .iter()
            .map(|p| page.post_id(p))
            .collect();
        assert_eq!(ids, vec!["first", "second", "edge"]);
        assert!(page.is_processed("first"));
        assert!(!page.is_processed("far"));

        assert!(list_candidate_posts(&page, 2.0).is_empty());
    }

    #[test]
    fn scrolling_brings_posts_into_range() {
        let page = page_with(vec![post("far", "a", "far below", 5000.0)]);
        assert!(list_candidate_posts(&page, 2.0).is_empty());

        page.scroll_to(4000.0);
        assert_eq!(list_candidate_posts(&page, 2.0).len(), 1);
    }

    #[test]
    fn extract_trims_and_defaults_to_empty() {
        let page = page_with(vec![
            post("p1", "  alice ", "\n The game last night was incredible  ", 0.0),
            PostSpec {
                id: "media".to_string(),
                author: Some("bob".to_string()),
                text: None,
                top: 100.0,
            },
        ]);
        let posts = page.posts();

        assert_eq!(
            extract(&page, &posts[0]),
            PostContent::new("alice", "The game last night was incredible")
        );
        let media = extract(&page, &posts[1]);
        assert_eq!(media.author, "bob");
        assert!(!media.is_classifiable());
    }

    #[test]
    fn remove_collapses_keep_leaves_alone() {
        let page = page_with(vec![post("p1", "a", "x", 0.0), post("p2", "a", "y", 50.0)]);
        let posts = page.posts();

        apply_decision(&page, &posts[0], Decision::Remove).unwrap();
        apply_decision(&page, &posts[1], Decision::Keep).unwrap();

        assert_eq!(page.style("p1", "visibility").as_deref(), Some("hidden"));
        assert_eq!(page.style("p1", "height").as_deref(), Some("0"));
        assert_eq!(page.attribute(&posts[0], ARIA_HIDDEN).as_deref(), Some("true"));
        assert!(page.is_collapsed("p1"));
        assert!(!page.is_collapsed("p2"));
        assert_eq!(page.style("p2", "visibility"), None);
    }

    #[test]
    fn restore_unsets_collapse_styles() {
        let page = page_with(vec![post("p1", "a", "x", 0.0)]);
        let candidates = list_candidate_posts(&page, 2.0);
        apply_decision(&page, &candidates[0], Decision::Remove).unwrap();

        assert_eq!(restore_all(&page), 1);
        for property in ["visibility", "height", "margin", "padding", "min-height", "overflow"] {
            assert_eq!(page.style("p1", property), None, "{property} still set");
        }
        assert_eq!(page.attribute(&candidates[0], ARIA_HIDDEN), None);
        assert!(page.is_processed("p1"));
    }

    #[test]
    fn detached_post_is_an_error() {
        let page = page_with(vec![post("p1", "a", "x", 0.0)]);
        let handle = page.posts().remove(0);
        page.remove_posts(&["p1".to_string()]);

        assert!(matches!(
            apply_decision(&page, &handle, Decision::Remove),
            Err(SurfaceError::Detached(_))
        ));
    }
}
