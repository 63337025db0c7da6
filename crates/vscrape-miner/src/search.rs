//! Search stage: parallel attempts, filtering and de-duplication.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use vscrape_media::{Egress, EgressPool};
use vscrape_models::constants::SEARCH_FAN_OUT;
use vscrape_models::{KnownIdSet, RawSearchEntry, SearchResult, VideoId};

use crate::error::MinerResult;
use crate::metrics;
use crate::stages::{IdentityRewriter, QueryRewriter, SearchProvider};

/// Fans a query out to K independently rewritten search attempts and merges
/// the results into one de-duplicated candidate list.
#[derive(Clone)]
pub struct SearchStage {
    provider: Arc<dyn SearchProvider>,
    rewriter: Arc<dyn QueryRewriter>,
    known_ids: KnownIdSet,
    egress: Arc<EgressPool>,
    fan_out: usize,
}

impl SearchStage {
    pub fn new(provider: Arc<dyn SearchProvider>, known_ids: KnownIdSet) -> Self {
        Self {
            provider,
            rewriter: Arc::new(IdentityRewriter),
            known_ids,
            egress: Arc::new(EgressPool::direct()),
            fan_out: SEARCH_FAN_OUT,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    pub fn with_egress(mut self, egress: Arc<EgressPool>) -> Self {
        self.egress = egress;
        self
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    /// Search for up to `max_results` unique, unknown, non-live candidates.
    ///
    /// Results are merged in attempt completion order, first occurrence
    /// wins. Once `max_results` candidates exist the remaining attempts are
    /// aborted. A failed attempt contributes nothing; a provider block also
    /// cools down the egress it used.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        if max_results == 0 {
            return Vec::new();
        }

        let mut attempts = JoinSet::new();
        for attempt in 0..self.fan_out {
            let provider = Arc::clone(&self.provider);
            let rewriter = Arc::clone(&self.rewriter);
            let egress = self.egress.select();
            let query = query.to_string();

            attempts.spawn(async move {
                let result = run_attempt(&*provider, &*rewriter, &query, egress.as_ref()).await;
                (attempt, egress, result)
            });
        }

        let mut seen: HashSet<VideoId> = HashSet::new();
        let mut results = Vec::new();

        while let Some(joined) = attempts.join_next().await {
            let (attempt, entries) = match joined {
                Ok((attempt, egress, Ok(entries))) => {
                    metrics::record_search_attempt("ok");
                    if let Some(egress) = &egress {
                        self.egress.record_success(egress);
                    }
                    (attempt, entries)
                }
                Ok((attempt, egress, Err(e))) => {
                    if let (Some(egress), true) = (&egress, e.is_provider_blocked()) {
                        metrics::record_search_attempt("blocked");
                        self.egress.record_blocked(egress);
                    } else {
                        metrics::record_search_attempt("error");
                    }
                    warn!(attempt, error = %e, "Search attempt failed");
                    continue;
                }
                Err(e) => {
                    metrics::record_search_attempt("error");
                    warn!(error = %e, "Search attempt task failed");
                    continue;
                }
            };

            let before = results.len();
            for entry in entries {
                if !admit(&self.known_ids, &entry) {
                    continue;
                }
                let candidate = entry.into_result();
                if seen.insert(candidate.id.clone()) {
                    results.push(candidate);
                }
                if results.len() >= max_results {
                    break;
                }
            }
            debug!(attempt, added = results.len() - before, "Merged search attempt");

            if results.len() >= max_results {
                attempts.abort_all();
                break;
            }
        }

        info!(
            query = query,
            candidates = results.len(),
            max_results,
            "Search stage finished"
        );
        results
    }
}

async fn run_attempt(
    provider: &dyn SearchProvider,
    rewriter: &dyn QueryRewriter,
    query: &str,
    egress: Option<&Egress>,
) -> MinerResult<Vec<RawSearchEntry>> {
    let rewritten = rewriter.rewrite(query).await?;
    debug!(query = query, rewritten = %rewritten, "Search attempt");
    Ok(provider.search(&rewritten, egress).await?)
}

/// Whether a raw entry may become a candidate: not already known and not an
/// ongoing live broadcast.
pub fn admit(known_ids: &KnownIdSet, entry: &RawSearchEntry) -> bool {
    if entry.is_live_broadcast() {
        return false;
    }
    !known_ids.contains(&VideoId::from(entry.id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vscrape_media::{MediaError, MediaResult};
    use vscrape_ml_client::{MlError, MlResult};

    fn entry(id: &str) -> RawSearchEntry {
        RawSearchEntry {
            id: id.to_string(),
            title: Some(format!("title {id}")),
            duration: Some(200.0),
            ..RawSearchEntry::default()
        }
    }

    /// Returns the same entries for every query; fails the first `fail` calls.
    struct StaticProvider {
        entries: Vec<RawSearchEntry>,
        fail: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for StaticProvider {
        async fn search(
            &self,
            _query: &str,
            _egress: Option<&Egress>,
        ) -> MediaResult<Vec<RawSearchEntry>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail {
                return Err(MediaError::search_failed("HTTP Error 429"));
            }
            Ok(self.entries.clone())
        }
    }

    /// Maps the query to a disjoint page of ids per attempt.
    struct PagedProvider;

    #[async_trait]
    impl SearchProvider for PagedProvider {
        async fn search(
            &self,
            query: &str,
            _egress: Option<&Egress>,
        ) -> MediaResult<Vec<RawSearchEntry>> {
            Ok((0..5).map(|i| entry(&format!("{query}-{i}"))).collect())
        }
    }

    struct CountingRewriter(AtomicUsize);

    #[async_trait]
    impl QueryRewriter for CountingRewriter {
        async fn rewrite(&self, query: &str) -> MlResult<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{query}{n}"))
        }
    }

    struct FailingRewriter;

    #[async_trait]
    impl QueryRewriter for FailingRewriter {
        async fn rewrite(&self, _query: &str) -> MlResult<String> {
            Err(MlError::ServiceUnavailable("down".into()))
        }
    }

    /// Never returns.
    struct HangingProvider;

    #[async_trait]
    impl SearchProvider for HangingProvider {
        async fn search(
            &self,
            _query: &str,
            _egress: Option<&Egress>,
        ) -> MediaResult<Vec<RawSearchEntry>> {
            std::future::pending().await
        }
    }

    fn stage(provider: impl SearchProvider + 'static) -> SearchStage {
        SearchStage::new(Arc::new(provider), KnownIdSet::empty())
    }

    #[test]
    fn test_admit_filters_known_and_live() {
        let known: KnownIdSet = vec![VideoId::from("aaaaaaaaaaa")].into_iter().collect();

        assert!(!admit(&known, &entry("aaaaaaaaaaa")));
        assert!(admit(&known, &entry("bbbbbbbbbbb")));

        let live = RawSearchEntry {
            is_live: Some(true),
            ..entry("ccccccccccc")
        };
        assert!(!admit(&known, &live));

        let live_status = RawSearchEntry {
            live_status: Some("is_live".to_string()),
            ..entry("ddddddddddd")
        };
        assert!(!admit(&known, &live_status));

        let was_live = RawSearchEntry {
            live_status: Some("was_live".to_string()),
            ..entry("eeeeeeeeeee")
        };
        assert!(admit(&known, &was_live));
    }

    #[test]
    fn test_admit_is_idempotent() {
        let known: KnownIdSet = vec![VideoId::from("k")].into_iter().collect();
        let live = RawSearchEntry {
            is_live: Some(true),
            ..entry("l")
        };
        let entries = vec![entry("a"), entry("k"), live, entry("b")];

        let once: Vec<_> = entries.into_iter().filter(|e| admit(&known, e)).collect();
        let twice: Vec<_> = once.iter().filter(|e| admit(&known, e)).cloned().collect();

        let ids = |v: &[RawSearchEntry]| v.iter().map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&once), vec!["a", "b"]);
        assert_eq!(ids(&once), ids(&twice));
    }

    #[tokio::test]
    async fn test_duplicates_merged_across_attempts() {
        let provider = StaticProvider {
            entries: vec![entry("a"), entry("b"), entry("a"), entry("c")],
            fail: 0,
            calls: AtomicUsize::new(0),
        };
        let results = stage(provider).search("cats", 10).await;

        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_known_and_live_never_returned() {
        let live = RawSearchEntry {
            live_status: Some("is_live".to_string()),
            ..entry("live")
        };
        let provider = StaticProvider {
            entries: vec![entry("known"), live, entry("fresh")],
            fail: 0,
            calls: AtomicUsize::new(0),
        };
        let known: KnownIdSet = vec![VideoId::from("known")].into_iter().collect();
        let stage = SearchStage::new(Arc::new(provider), known);

        let results = stage.search("cats", 10).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_str(), "fresh");
    }

    #[tokio::test]
    async fn test_stops_at_max_results() {
        let provider = StaticProvider {
            entries: (0..50).map(|i| entry(&format!("id{i}"))).collect(),
            fail: 0,
            calls: AtomicUsize::new(0),
        };
        let results = stage(provider).search("cats", 12).await;
        assert_eq!(results.len(), 12);
    }

    #[tokio::test]
    async fn test_failed_attempt_reduces_supply() {
        let provider = StaticProvider {
            entries: vec![entry("a"), entry("b")],
            fail: 2,
            calls: AtomicUsize::new(0),
        };
        let results = stage(provider).with_fan_out(3).search("cats", 10).await;
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_all_attempts_failing_yields_nothing() {
        let provider = StaticProvider {
            entries: vec![entry("a")],
            fail: usize::MAX,
            calls: AtomicUsize::new(0),
        };
        assert!(stage(provider).search("cats", 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_rewrites_are_independent_per_attempt() {
        let results = stage(PagedProvider)
            .with_rewriter(Arc::new(CountingRewriter(AtomicUsize::new(0))))
            .with_fan_out(3)
            .search("q", 100)
            .await;
        // Three distinct rewrites, five entries each
        assert_eq!(results.len(), 15);
    }

    #[tokio::test]
    async fn test_rewrite_failure_is_attempt_failure() {
        let results = stage(PagedProvider)
            .with_rewriter(Arc::new(FailingRewriter))
            .search("q", 100)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_remaining_attempts_aborted_once_full() {
        // One fast attempt fills the quota; the hanging ones must not block
        struct Mixed(AtomicUsize);

        #[async_trait]
        impl SearchProvider for Mixed {
            async fn search(
                &self,
                query: &str,
                egress: Option<&Egress>,
            ) -> MediaResult<Vec<RawSearchEntry>> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    PagedProvider.search(query, egress).await
                } else {
                    HangingProvider.search(query, egress).await
                }
            }
        }

        let results = tokio::time::timeout(
            Duration::from_secs(5),
            stage(Mixed(AtomicUsize::new(0))).search("q", 3),
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_blocked_attempt_cools_egress() {
        let provider = StaticProvider {
            entries: vec![entry("a")],
            fail: 0,
            calls: AtomicUsize::new(0),
        };
        struct Blocking;

        #[async_trait]
        impl SearchProvider for Blocking {
            async fn search(
                &self,
                _query: &str,
                _egress: Option<&Egress>,
            ) -> MediaResult<Vec<RawSearchEntry>> {
                Err(MediaError::provider_blocked("HTTP Error 429: Too Many Requests"))
            }
        }

        let proxy = Egress::Proxy("http://proxy.example:8080".parse().unwrap());
        let pool = Arc::new(EgressPool::new(vec![proxy]));

        let results = stage(Blocking)
            .with_egress(Arc::clone(&pool))
            .with_fan_out(2)
            .search("cats", 10)
            .await;
        assert!(results.is_empty());
        let stats = pool.stats();
        assert_eq!(stats.blocked_count, 2);
        assert_eq!(stats.cooling_count, 1);

        // A plain failure or a success never counts as blocked
        let pool = Arc::new(EgressPool::new(vec![Egress::Proxy(
            "http://other.example:8080".parse().unwrap(),
        )]));
        let results = stage(provider)
            .with_egress(Arc::clone(&pool))
            .with_fan_out(1)
            .search("cats", 10)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(pool.stats().blocked_count, 0);
        assert_eq!(pool.stats().success_count, 1);
    }

    #[tokio::test]
    async fn test_zero_max_results() {
        assert!(stage(PagedProvider).search("q", 0).await.is_empty());
    }
}
