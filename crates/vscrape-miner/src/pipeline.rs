//! Pipeline coordinator.
//!
//! One `acquire` call searches for candidates, then runs
//! download → clip → embed for each candidate on a bounded pool of tasks.
//! Completions are consumed in arrival order; the first `target_count`
//! successes become the result and everything still in flight is aborted.
//!
//! Every temporary file is owned by a handle whose drop removes it, and
//! every child process is killed when its future is dropped, so aborting a
//! task reclaims its resources. The coordinator waits for aborted tasks to
//! finish unwinding before it returns.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, Instrument};

use vscrape_media::{EgressPool, MediaError};
use vscrape_models::{
    CandidateOutcome, CandidateState, FailureKind, SearchResult, VideoRecord,
};

use crate::config::MinerConfig;
use crate::error::{MinerError, MinerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::search::SearchStage;
use crate::stages::{
    classify_media_error, Clipper, Embedder, LeadingWindow, MediaFetcher, WindowSelector,
};

/// Result of one acquire round.
#[derive(Debug, Clone, Serialize)]
pub struct AcquireReport {
    pub run_id: String,
    pub query: String,
    pub target_count: usize,
    pub started_at: DateTime<Utc>,
    /// Accepted records in completion order
    pub records: Vec<VideoRecord>,
    /// Terminal outcome of every candidate that finished
    pub outcomes: Vec<CandidateOutcome>,
    /// Candidates returned by the search stage
    pub candidates: usize,
    /// Candidates handed to a worker
    pub dispatched: usize,
    /// Candidates still in flight when the quota was met
    pub abandoned: usize,
    pub elapsed: Duration,
    /// Caller-visible deadline; advisory only
    pub deadline: Duration,
}

impl AcquireReport {
    pub fn met_target(&self) -> bool {
        self.records.len() >= self.target_count
    }

    pub fn within_deadline(&self) -> bool {
        self.elapsed < self.deadline
    }

    /// Full quota delivered before the deadline.
    pub fn met_sla(&self) -> bool {
        self.met_target() && self.within_deadline()
    }

    /// Failed candidates per failure kind.
    pub fn failures_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for kind in self.outcomes.iter().filter_map(|o| o.failure) {
            *counts.entry(kind.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Runs acquire rounds against injected stages.
pub struct Coordinator {
    config: MinerConfig,
    search: SearchStage,
    worker: CandidateWorker,
}

impl Coordinator {
    pub fn new(
        config: MinerConfig,
        search: SearchStage,
        fetcher: Arc<dyn MediaFetcher>,
        clipper: Arc<dyn Clipper>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let worker = CandidateWorker {
            query: Arc::from(""),
            fetcher,
            clipper,
            embedder,
            windows: Arc::new(LeadingWindow),
            egress: Arc::new(EgressPool::direct()),
            max_clip_secs: config.max_clip_secs,
        };
        Self {
            config,
            search,
            worker,
        }
    }

    pub fn with_window_selector(mut self, windows: Arc<dyn WindowSelector>) -> Self {
        self.worker.windows = windows;
        self
    }

    /// Egress pool used for downloads; block and success reports feed back
    /// into it.
    pub fn with_egress(mut self, egress: Arc<EgressPool>) -> Self {
        self.worker.egress = egress;
        self
    }

    /// Acquire up to `target_count` records for `query`.
    ///
    /// Returns fewer records when candidates run out. Per-candidate failures
    /// are recorded in the report; only an empty search result or
    /// cancellation through `cancel` fail the call. `deadline` is not
    /// enforced, only reported.
    pub async fn acquire(
        &self,
        query: &str,
        target_count: usize,
        deadline: Duration,
        mut cancel: watch::Receiver<bool>,
    ) -> MinerResult<AcquireReport> {
        let logger = RunLogger::new(query);
        let span = logger.create_span();

        async {
            let started = Instant::now();
            let mut report = AcquireReport {
                run_id: logger.run_id().to_string(),
                query: query.to_string(),
                target_count,
                started_at: Utc::now(),
                records: Vec::new(),
                outcomes: Vec::new(),
                candidates: 0,
                dispatched: 0,
                abandoned: 0,
                elapsed: Duration::ZERO,
                deadline,
            };

            logger.log_start(&format!("target={target_count}"));
            if target_count == 0 {
                logger.log_completion("nothing requested");
                return Ok(report);
            }

            let max_results = self.config.max_results(target_count);
            let candidates = tokio::select! {
                candidates = self.search.search(query, max_results) => candidates,
                _ = cancelled(&mut cancel) => {
                    logger.log_warning("cancelled during search");
                    return Err(MinerError::Cancelled);
                }
            };

            if candidates.is_empty() {
                logger.log_error("search returned no candidates");
                return Err(MinerError::NoCandidates(query.to_string()));
            }
            report.candidates = candidates.len();
            logger.log_progress(&format!(
                "{} candidates for {} records",
                candidates.len(),
                target_count
            ));

            let worker = CandidateWorker {
                query: Arc::from(query),
                ..self.worker.clone()
            };
            let mut queue: VecDeque<SearchResult> = candidates.into();
            let mut tasks: JoinSet<(CandidateOutcome, Option<VideoRecord>)> = JoinSet::new();
            let max_parallel = self.config.max_parallel.max(1);

            loop {
                while tasks.len() < max_parallel && report.records.len() < target_count {
                    let Some(candidate) = queue.pop_front() else {
                        break;
                    };
                    let worker = worker.clone();
                    tasks.spawn(async move { worker.run(candidate).await }.in_current_span());
                    report.dispatched += 1;
                }

                if tasks.is_empty() {
                    break;
                }

                let joined = tokio::select! {
                    joined = tasks.join_next() => joined,
                    _ = cancelled(&mut cancel) => {
                        logger.log_warning("cancelled, abandoning in-flight candidates");
                        drain(&mut tasks).await;
                        return Err(MinerError::Cancelled);
                    }
                };

                match joined {
                    Some(Ok((outcome, record))) => {
                        logger.log_outcome(&outcome);
                        metrics::record_candidate(
                            outcome.failure.map(|k| k.as_str()).unwrap_or("done"),
                        );
                        report.outcomes.push(outcome);
                        if let Some(record) = record {
                            report.records.push(record);
                        }
                    }
                    Some(Err(e)) => error!(error = %e, "Candidate task failed"),
                    None => break,
                }

                if report.records.len() >= target_count {
                    break;
                }
            }

            report.abandoned = tasks.len();
            if report.abandoned > 0 {
                debug!(abandoned = report.abandoned, "Abandoning in-flight candidates");
            }
            drain(&mut tasks).await;

            report.elapsed = started.elapsed();
            metrics::record_acquire(report.elapsed.as_secs_f64(), report.met_target());
            logger.log_completion(&format!(
                "{}/{} records, {} dispatched, {} abandoned, {:.1}s (deadline {}s)",
                report.records.len(),
                target_count,
                report.dispatched,
                report.abandoned,
                report.elapsed.as_secs_f64(),
                deadline.as_secs()
            ));
            if !report.met_sla() {
                logger.log_warning(&format!(
                    "round missed its target or deadline, failures: {:?}",
                    report.failures_by_kind()
                ));
            }

            Ok(report)
        }
        .instrument(span)
        .await
    }
}

/// Abort every task and wait until each has been dropped.
async fn drain<T: 'static>(tasks: &mut JoinSet<T>) {
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}

/// Resolves once the cancel flag is set; never if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Where and why a candidate failed.
#[derive(Debug)]
struct CandidateFailure {
    during: CandidateState,
    kind: FailureKind,
    detail: String,
}

impl CandidateFailure {
    fn media(during: CandidateState, err: &MediaError) -> Self {
        Self {
            during,
            kind: classify_media_error(during, err),
            detail: err.to_string(),
        }
    }

    fn new(during: CandidateState, kind: FailureKind, detail: impl ToString) -> Self {
        Self {
            during,
            kind,
            detail: detail.to_string(),
        }
    }
}

/// Everything one candidate task needs; cheap to clone per task.
#[derive(Clone)]
struct CandidateWorker {
    query: Arc<str>,
    fetcher: Arc<dyn MediaFetcher>,
    clipper: Arc<dyn Clipper>,
    embedder: Arc<dyn Embedder>,
    windows: Arc<dyn WindowSelector>,
    egress: Arc<EgressPool>,
    max_clip_secs: u32,
}

impl CandidateWorker {
    async fn run(&self, candidate: SearchResult) -> (CandidateOutcome, Option<VideoRecord>) {
        let started = Instant::now();
        let mut state = CandidateState::Queued;
        let result = self.process(&candidate, &mut state).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(record) => {
                advance(&mut state, CandidateState::Done);
                (
                    CandidateOutcome::done(candidate.id.clone(), elapsed_ms),
                    Some(record),
                )
            }
            Err(failure) => {
                advance(&mut state, CandidateState::Failed);
                (
                    CandidateOutcome::failed(
                        candidate.id.clone(),
                        failure.during,
                        failure.kind,
                        failure.detail,
                        elapsed_ms,
                    ),
                    None,
                )
            }
        }
    }

    async fn process(
        &self,
        candidate: &SearchResult,
        state: &mut CandidateState,
    ) -> Result<VideoRecord, CandidateFailure> {
        // Nothing to describe means no record; skip the download entirely
        let description = candidate.compose_description();
        if description.trim().is_empty() {
            return Err(CandidateFailure::new(
                *state,
                FailureKind::ContentUnavailable,
                "candidate has neither title nor description",
            ));
        }

        advance(state, CandidateState::Downloading);
        let egress = self.egress.select();
        let hint = self.windows.hint(&self.query, candidate);
        let download_started = Instant::now();

        let media = match self.fetcher.fetch(candidate, hint, egress.as_ref()).await {
            Ok(media) => media,
            Err(e) => {
                let failure = CandidateFailure::media(*state, &e);
                if let (Some(egress), true) = (&egress, failure.kind.implicates_egress()) {
                    self.egress.record_blocked(egress);
                }
                return Err(failure);
            }
        };
        if let Some(egress) = &egress {
            self.egress.record_success(egress);
        }
        metrics::record_download_duration(download_started.elapsed().as_secs_f64());

        advance(state, CandidateState::Clipping);
        let window = self
            .windows
            .select(&self.query, candidate, &media, self.max_clip_secs)
            .map_err(|e| CandidateFailure::new(*state, FailureKind::TranscodeFailure, e))?;
        let file_window = window
            .within_section(media.section_start, media.length_seconds, self.max_clip_secs)
            .map_err(|e| CandidateFailure::new(*state, FailureKind::TranscodeFailure, e))?;

        let clip = self
            .clipper
            .clip(&media, file_window)
            .await
            .map_err(|e| CandidateFailure::media(*state, &e))?;
        drop(media);

        advance(state, CandidateState::Embedding);
        let embeddings = self
            .embedder
            .embed(&description, clip.path())
            .await
            .map_err(|e| CandidateFailure::new(*state, FailureKind::EmbeddingFailure, e))?;
        drop(clip);

        // The record keeps the source-time window
        VideoRecord::assemble(candidate, description, window, embeddings)
            .map_err(|e| CandidateFailure::new(*state, FailureKind::EmbeddingFailure, e))
    }
}

fn advance(state: &mut CandidateState, next: CandidateState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transition {state} -> {next}"
    );
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(records: usize, target: usize, elapsed: u64) -> AcquireReport {
        AcquireReport {
            run_id: "r".to_string(),
            query: "q".to_string(),
            target_count: target,
            started_at: Utc::now(),
            records: Vec::with_capacity(records),
            outcomes: vec![
                CandidateOutcome::failed(
                    "a".into(),
                    CandidateState::Downloading,
                    FailureKind::ProviderBlocked,
                    "429",
                    1,
                ),
                CandidateOutcome::failed(
                    "b".into(),
                    CandidateState::Downloading,
                    FailureKind::ProviderBlocked,
                    "429",
                    1,
                ),
                CandidateOutcome::done("c".into(), 1),
            ],
            candidates: 3,
            dispatched: 3,
            abandoned: 0,
            elapsed: Duration::from_secs(elapsed),
            deadline: Duration::from_secs(90),
        }
    }

    #[test]
    fn test_sla() {
        let r = report(0, 0, 10);
        assert!(r.met_target());
        assert!(r.met_sla());

        let late = report(0, 0, 95);
        assert!(late.met_target());
        assert!(!late.within_deadline());
        assert!(!late.met_sla());

        let short = report(0, 8, 10);
        assert!(!short.met_sla());
    }

    #[test]
    fn test_failures_by_kind() {
        let counts = report(0, 8, 10).failures_by_kind();
        assert_eq!(counts.get("provider_blocked"), Some(&2));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn test_advance() {
        let mut state = CandidateState::Queued;
        advance(&mut state, CandidateState::Downloading);
        advance(&mut state, CandidateState::Failed);
        assert_eq!(state, CandidateState::Failed);
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_flag() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_pends_without_sender() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        let result = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut rx)).await;
        assert!(result.is_err());
    }
}
