use std::sync::Arc;

use anyhow::Result;
use futures::{future::join_all, FutureExt};

use crate::{
    ai::Classifier,
    context::FilterContext,
    dom::{extraction, Surface},
    domain::{Decision, Fingerprint, Settings},
    tasks::inflight::Claim,
};

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    /// No body text; nothing fingerprinted.
    Skipped,
    Cached(Decision),
    Joined(Decision),
    Classified(Decision),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub candidates: usize,
    pub skipped: usize,
    pub cached: usize,
    pub joined: usize,
    pub classified: usize,
    pub removed: usize,
    pub failed: usize,
}

impl PassSummary {
    fn absorb(&mut self, outcome: &Result<PostOutcome>) {
        let decision = match outcome {
            Ok(PostOutcome::Skipped) => {
                self.skipped += 1;
                return;
            }
            Ok(PostOutcome::Cached(decision)) => {
                self.cached += 1;
                *decision
            }
            Ok(PostOutcome::Joined(decision)) => {
                self.joined += 1;
                *decision
            }
            Ok(PostOutcome::Classified(decision)) => {
                self.classified += 1;
                *decision
            }
            Err(_) => {
                self.failed += 1;
                return;
            }
        };
        if !decision.is_keep() {
            self.removed += 1;
        }
    }
}

pub struct TimelineProcessor<S: Surface, C: Classifier> {
    surface: Arc<S>,
    classifier: Arc<C>,
    context: Arc<FilterContext>,
    lookahead: f64,
}

impl<S: Surface, C: Classifier> TimelineProcessor<S, C> {
    pub fn new(
        surface: Arc<S>,
        classifier: Arc<C>,
        context: Arc<FilterContext>,
        lookahead: f64,
    ) -> Self {
        Self {
            surface,
            classifier,
            context,
            lookahead,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn context(&self) -> &Arc<FilterContext> {
        &self.context
    }

    pub async fn run_pass(&self) -> PassSummary {
        let settings = self.context.settings();
        if !settings.is_enabled {
            return PassSummary::default();
        }

        let candidates = extraction::list_candidate_posts(self.surface.as_ref(), self.lookahead);
        let mut summary = PassSummary {
            candidates: candidates.len(),
            ..PassSummary::default()
        };
        if candidates.is_empty() {
            return summary;
        }

        let work = candidates
            .into_iter()
            .map(|post| self.process_post(post, &settings));
        for (outcome, post_id) in join_all(work).await {
            if let Err(err) = &outcome {
                tracing::error!(
                    target: "pipeline",
                    post = %post_id,
                    error = %err,
                    "failed to process post"
                );
            }
            summary.absorb(&outcome);
        }

        tracing::debug!(
            target: "pipeline",
            candidates = summary.candidates,
            cached = summary.cached,
            classified = summary.classified,
            joined = summary.joined,
            removed = summary.removed,
            failed = summary.failed,
            "pass complete"
        );
        summary
    }

    async fn process_post(
        &self,
        post: S::Post,
        settings: &Settings,
    ) -> (Result<PostOutcome>, String) {
        let post_id = self.surface.post_id(&post);
        (self.resolve(&post, settings).await, post_id)
    }

    async fn resolve(&self, post: &S::Post, settings: &Settings) -> Result<PostOutcome> {
        let content = extraction::extract(self.surface.as_ref(), post);
        if !content.is_classifiable() {
            return Ok(PostOutcome::Skipped);
        }

        let fingerprint = Fingerprint::of(&content.author, &content.text);
        if let Some(decision) = self.context.cache().get(&fingerprint) {
            extraction::apply_decision(self.surface.as_ref(), post, decision)?;
            return Ok(PostOutcome::Cached(decision));
        }

        let request = {
            let classifier = self.classifier.clone();
            let settings = settings.clone();
            let content = content.clone();
            async move { classifier.classify(&content, &settings).await }.boxed()
        };

        match self.context.inflight().register(fingerprint.clone(), request) {
            Claim::Joined(pending) => {
                let decision = pending.await;
                extraction::apply_decision(self.surface.as_ref(), post, decision)?;
                Ok(PostOutcome::Joined(decision))
            }
            Claim::Owner(guard) => {
                let decision = guard.wait().await;
                tracing::info!(
                    target: "pipeline",
                    author = %content.author,
                    preview = %content.preview(PREVIEW_CHARS),
                    verdict = decision.label(),
                    "new classification"
                );
                // Cache before the guard clears the in-flight entry so a
                // concurrent lookup always finds one of the two.
                self.context.cache().record(fingerprint, decision);
                drop(guard);

                extraction::apply_decision(self.surface.as_ref(), post, decision)?;
                Ok(PostOutcome::Classified(decision))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::{
        cache::CachePolicy,
        db::{store, MemoryStore, StoreValues},
        dom::{Page, PostSpec},
        domain::PostContent,
    };

    /// Classifier double: counts calls and answers from a fixed rule.
    pub(crate) struct ScriptedClassifier {
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<PostContent>>,
        gate: Option<Arc<Semaphore>>,
        remove_when: fn(&PostContent) -> bool,
    }

    impl ScriptedClassifier {
        pub(crate) fn new(remove_when: fn(&PostContent) -> bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                gate: None,
                remove_when,
            }
        }

        /// Holds every answer until the returned semaphore gets permits.
        pub(crate) fn gated(remove_when: fn(&PostContent) -> bool) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            let mut classifier = Self::new(remove_when);
            classifier.gate = Some(gate.clone());
            (classifier, gate)
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Classifier for ScriptedClassifier {
        async fn classify(&self, post: &PostContent, _settings: &Settings) -> Decision {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(post.clone());
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            if (self.remove_when)(post) {
                Decision::Remove
            } else {
                Decision::Keep
            }
        }
    }

    pub(crate) fn mentions_game(post: &PostContent) -> bool {
        post.text.contains("game")
    }

    pub(crate) fn configured_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_values(StoreValues::from([
            (store::API_KEY.to_string(), json!("sk-test")),
            (
                store::FILTER_CONDITION.to_string(),
                json!("remove posts about sports"),
            ),
        ])))
    }

    pub(crate) fn listed_post(id: &str, author: &str, text: &str, top: f64) -> PostSpec {
        PostSpec {
            id: id.to_string(),
            author: Some(author.to_string()),
            text: Some(text.to_string()),
            top,
        }
    }

    async fn processor(
        classifier: ScriptedClassifier,
    ) -> (TimelineProcessor<Page, ScriptedClassifier>, Page, Arc<ScriptedClassifier>) {
        let page = Page::new("/home", 800.0);
        let classifier = Arc::new(classifier);
        let context = FilterContext::initialize(configured_store(), CachePolicy::default()).await;
        let processor =
            TimelineProcessor::new(Arc::new(page.clone()), classifier.clone(), context, 2.0);
        (processor, page, classifier)
    }

    #[tokio::test]
    async fn sports_post_is_collapsed_then_served_from_cache() {
        let (processor, page, classifier) = processor(ScriptedClassifier::new(mentions_game)).await;

        page.add_posts(vec![listed_post("a", "alice", "The game last night was incredible", 0.0)]);
        let first = processor.run_pass().await;
        assert_eq!(first.classified, 1);
        assert!(page.is_collapsed("a"));
        assert_eq!(
            classifier.seen.lock()[0],
            PostContent::new("alice", "The game last night was incredible")
        );

        page.add_posts(vec![listed_post(
            "b",
            "alice",
            "The game last night was incredible",
            300.0,
        )]);
        let second = processor.run_pass().await;
        assert_eq!(second.cached, 1);
        assert!(page.is_collapsed("b"));
        assert_eq!(classifier.calls(), 1);
    }

    #[tokio::test]
    async fn duplicates_in_one_pass_share_a_request() {
        let (processor, page, classifier) = processor(ScriptedClassifier::new(mentions_game)).await;
        page.add_posts(vec![
            listed_post("a", "alice", "The game last night was incredible", 0.0),
            listed_post("b", "alice", "The game last night was incredible", 200.0),
            listed_post("c", "bob", "Lovely weather today", 400.0),
        ]);

        let summary = processor.run_pass().await;
        assert_eq!(classifier.calls(), 2);
        assert_eq!(summary.classified + summary.joined + summary.cached, 3);
        assert_eq!(summary.removed, 2);
        assert!(page.is_collapsed("a") && page.is_collapsed("b"));
        assert!(!page.is_collapsed("c"));
    }

    #[tokio::test]
    async fn concurrent_passes_issue_one_request() {
        let (classifier, gate) = ScriptedClassifier::gated(mentions_game);
        let (processor, page, classifier) = processor(classifier).await;
        let processor = Arc::new(processor);

        page.add_posts(vec![listed_post("a", "alice", "The game last night was incredible", 0.0)]);
        let first = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_pass().await }
        });
        tokio::task::yield_now().await;

        page.add_posts(vec![listed_post(
            "b",
            "alice",
            "The game last night was incredible",
            100.0,
        )]);
        let second = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_pass().await }
        });
        tokio::task::yield_now().await;
        assert!(processor.context().inflight().has(&Fingerprint::of(
            "alice",
            "The game last night was incredible"
        )));

        gate.add_permits(1);
        let (first, second) = (first.await.unwrap(), second.await.unwrap());

        assert_eq!(classifier.calls(), 1);
        assert_eq!(first.classified, 1);
        assert_eq!(second.joined, 1);
        assert!(page.is_collapsed("a") && page.is_collapsed("b"));
        assert!(processor.context().inflight().is_empty());
    }

    #[tokio::test]
    async fn pending_post_is_not_resubmitted() {
        let (classifier, gate) = ScriptedClassifier::gated(mentions_game);
        let (processor, page, classifier) = processor(classifier).await;
        let processor = Arc::new(processor);

        page.add_posts(vec![listed_post("a", "alice", "Big game tonight", 0.0)]);
        let first = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_pass().await }
        });
        tokio::task::yield_now().await;

        let again = processor.run_pass().await;
        assert_eq!(again.candidates, 0);

        gate.add_permits(1);
        first.await.unwrap();
        assert_eq!(classifier.calls(), 1);
        assert!(page.is_collapsed("a"));
    }

    #[tokio::test]
    async fn empty_text_is_skipped_without_caching() {
        let (processor, page, classifier) = processor(ScriptedClassifier::new(mentions_game)).await;
        page.add_posts(vec![PostSpec {
            id: "media".into(),
            author: Some("alice".into()),
            text: Some("   ".into()),
            top: 0.0,
        }]);

        let summary = processor.run_pass().await;
        assert_eq!(summary.skipped, 1);
        assert_eq!(classifier.calls(), 0);
        assert!(processor.context().cache().is_empty());
        assert!(page.is_processed("media"));
    }

    #[tokio::test]
    async fn detached_post_fails_alone_and_releases_tracker() {
        let (classifier, gate) = ScriptedClassifier::gated(mentions_game);
        let (processor, page, _classifier) = processor(classifier).await;
        let processor = Arc::new(processor);

        page.add_posts(vec![
            listed_post("gone", "alice", "Big game tonight", 0.0),
            listed_post("stays", "bob", "Another game recap", 100.0),
        ]);
        let pass = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_pass().await }
        });
        tokio::task::yield_now().await;
        page.remove_posts(&["gone".to_string()]);
        gate.add_permits(2);

        let summary = pass.await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.classified, 1);
        assert!(page.is_collapsed("stays"));
        assert!(processor.context().inflight().is_empty());
        assert_eq!(
            processor
                .context()
                .cache()
                .get(&Fingerprint::of("alice", "Big game tonight")),
            Some(Decision::Remove)
        );
    }

    #[tokio::test]
    async fn disabled_filter_does_nothing() {
        let (processor, page, classifier) = processor(ScriptedClassifier::new(mentions_game)).await;
        store::KeyValueStore::set(
            processor.context().store().as_ref(),
            StoreValues::from([(store::IS_ENABLED.to_string(), json!(false))]),
        )
        .await
        .unwrap();
        processor.context().refresh_settings().await.unwrap();

        page.add_posts(vec![listed_post("a", "alice", "Big game tonight", 0.0)]);
        assert_eq!(processor.run_pass().await, PassSummary::default());
        assert_eq!(classifier.calls(), 0);
        assert!(!page.is_processed("a"));
    }
}
