//! One ingest cycle end to end: fetch → store → normalize → cluster → sweep
//! → rank, under a wall-clock budget. Per-item and per-source failures are
//! captured on the run's audit row; only an error in the coordinator itself
//! marks the run FAILED.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use companionwire_archive::{ConnectorRegistry, FetchedItem, SourceConfig};
use companionwire_common::error::{kind, RunError};
use companionwire_common::hashing::{content_hash, extract_domain, normalize_url, truncate_with_ellipsis};
use companionwire_common::{IngestStatus, RunStatus};
use companionwire_store::models::NewRawSignal;
use companionwire_store::{RawInsertOutcome, Store};

use crate::clusterer::Clusterer;
use crate::normalizer::Normalizer;
use crate::ranker::Ranker;
use crate::stats::RunStats;

/// Stop handing out LLM work when less than this much budget remains.
const NORMALIZE_MARGIN: Duration = Duration::from_secs(10);
/// Stop clustering when less than this much budget remains.
const CLUSTER_MARGIN: Duration = Duration::from_secs(5);

pub struct Pipeline {
    store: Store,
    registry: ConnectorRegistry,
    normalizer: Arc<Normalizer>,
    clusterer: Clusterer,
    ranker: Ranker,
    sources: Vec<SourceConfig>,
    max_items: usize,
    timeout_ms: u64,
    llm_concurrency: usize,
}

/// What `POST /ingest` reports back about a cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub signals_fetched: u32,
    pub signals_accepted: u32,
    pub signals_rejected: u32,
    pub error_count: u32,
    pub duration_ms: u64,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        registry: ConnectorRegistry,
        normalizer: Arc<Normalizer>,
        clusterer: Clusterer,
        ranker: Ranker,
        sources: Vec<SourceConfig>,
        max_items: usize,
        timeout_ms: u64,
        llm_concurrency: usize,
    ) -> Self {
        Self {
            store,
            registry,
            normalizer,
            clusterer,
            ranker,
            sources,
            max_items,
            timeout_ms,
            llm_concurrency,
        }
    }

    /// Run one full cycle. Always returns a report; a coordinator-level
    /// failure is reflected in the report's status rather than bubbling out.
    pub async fn run_cycle(&self) -> anyhow::Result<CycleReport> {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(self.timeout_ms);

        let run_id = self.store.insert_run().await?;
        info!(run = %run_id, sources = self.sources.len(), "ingest cycle starting");

        match self.run_inner(deadline).await {
            Ok((stats, errors)) => {
                self.store
                    .finish_run(
                        run_id,
                        RunStatus::Completed.as_str(),
                        stats.items_fetched,
                        stats.signals_accepted,
                        stats.signals_rejected,
                        &errors,
                    )
                    .await?;
                info!("{stats}");
                Ok(CycleReport {
                    run_id,
                    status: RunStatus::Completed,
                    signals_fetched: stats.items_fetched,
                    signals_accepted: stats.signals_accepted,
                    signals_rejected: stats.signals_rejected,
                    error_count: errors.len() as u32,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
            Err(e) => {
                error!(run = %run_id, error = %e, "ingest cycle failed");
                let errors = vec![RunError::new(kind::PIPELINE_ERROR, e.to_string())];
                if let Err(e2) = self
                    .store
                    .finish_run(run_id, RunStatus::Failed.as_str(), 0, 0, 0, &errors)
                    .await
                {
                    error!(run = %run_id, error = %e2, "failed to record run failure");
                }
                Ok(CycleReport {
                    run_id,
                    status: RunStatus::Failed,
                    signals_fetched: 0,
                    signals_accepted: 0,
                    signals_rejected: 0,
                    error_count: 1,
                    duration_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    async fn run_inner(
        &self,
        deadline: Instant,
    ) -> anyhow::Result<(RunStats, Vec<RunError>)> {
        let mut stats = RunStats::default();
        let mut errors: Vec<RunError> = Vec::new();

        // 1. Fetch from every enabled source, concatenated in source order.
        // The cap runs over the concatenation, so later feeds get whatever
        // room is left.
        let mut items: Vec<(SourceConfig, FetchedItem)> = Vec::new();
        for source in self.sources.iter().filter(|s| s.enabled) {
            stats.sources_polled += 1;
            match self.registry.find(source) {
                Some(connector) => {
                    let outcome = connector.fetch(source).await;
                    errors.extend(outcome.errors);
                    items.extend(outcome.items.into_iter().map(|i| (source.clone(), i)));
                }
                None => {
                    errors.push(
                        RunError::new(
                            kind::NOT_IMPLEMENTED,
                            format!("no connector handles format '{}'", source.format),
                        )
                        .with_source(&source.name),
                    );
                }
            }
        }
        items.truncate(self.max_items);
        stats.items_fetched = items.len() as u32;

        // 2. Store raw signals; the content-hash index dedups.
        let mut pending: Vec<Uuid> = Vec::new();
        for (source, item) in &items {
            match self.store_item(source, item).await {
                Ok(RawInsertOutcome::Inserted { signal_id }) => {
                    stats.signals_stored += 1;
                    pending.push(signal_id);
                }
                Ok(RawInsertOutcome::Duplicate) => stats.duplicates_skipped += 1,
                Err(e) => {
                    warn!(url = item.url.as_str(), error = %e, "failed to store raw signal");
                    errors.push(
                        RunError::new(kind::PIPELINE_ERROR, e.to_string()).with_source(&source.name),
                    );
                }
            }
        }

        // 3. Normalize with bounded concurrency. Each task re-checks the
        // budget before starting; in-flight calls are never interrupted.
        let store = self.store.clone();
        let normalizer = self.normalizer.clone();
        let outcomes: Vec<(Uuid, Option<Result<IngestStatus, String>>)> =
            stream::iter(pending.iter().copied().map(|id| {
                let store = store.clone();
                let normalizer = normalizer.clone();
                async move {
                    if remaining(deadline) < NORMALIZE_MARGIN {
                        return (id, None);
                    }
                    let result = normalizer
                        .normalize_signal(&store, id)
                        .await
                        .map_err(|e| e.to_string());
                    (id, Some(result))
                }
            }))
            .buffer_unordered(self.llm_concurrency.max(1))
            .collect()
            .await;

        let mut accepted: Vec<Uuid> = Vec::new();
        for (id, outcome) in outcomes {
            match outcome {
                None => stats.signals_deferred += 1,
                Some(Ok(IngestStatus::Accepted)) => {
                    stats.signals_accepted += 1;
                    accepted.push(id);
                }
                Some(Ok(IngestStatus::Rejected)) => stats.signals_rejected += 1,
                Some(Ok(IngestStatus::Failed)) => stats.signals_failed += 1,
                Some(Ok(IngestStatus::Pending)) => {}
                Some(Err(e)) => {
                    stats.signals_failed += 1;
                    errors.push(RunError::new(kind::PIPELINE_ERROR, e).with_source(id.to_string()));
                }
            }
        }
        if stats.signals_deferred > 0 {
            info!(
                deferred = stats.signals_deferred,
                "normalization budget exhausted, remaining signals deferred to the next cycle"
            );
        }

        // 4. Cluster sequentially. Serialized on purpose: it avoids
        // cross-cluster lock contention and keeps each signal's candidate
        // snapshot consistent.
        for id in &accepted {
            if remaining(deadline) < CLUSTER_MARGIN {
                stats.clustering_deferred += 1;
                continue;
            }
            let Some(signal) = self.store.signal_by_id(*id).await? else {
                continue;
            };
            match self.clusterer.assign(&signal).await {
                Ok(cluster_id) => {
                    stats.signals_clustered += 1;
                    if let Err(e) = self.ranker.rescore(cluster_id).await {
                        warn!(cluster = %cluster_id, error = %e, "rescore after attach failed");
                    }
                }
                Err(e) => {
                    warn!(signal = %id, error = %e, "clustering failed");
                    errors.push(
                        RunError::new(kind::PIPELINE_ERROR, e.to_string()).with_source(id.to_string()),
                    );
                }
            }
        }
        if stats.clustering_deferred > 0 {
            info!(
                deferred = stats.clustering_deferred,
                "clustering budget exhausted, remaining signals stay unclustered until rerun"
            );
        }

        // 5 + 6. Sweep, then rescore everything still active.
        stats.clusters_swept = self.clusterer.sweep_stale().await?;
        stats.clusters_rescored = self.ranker.recompute_all().await?;

        Ok((stats, errors))
    }

    async fn store_item(
        &self,
        source: &SourceConfig,
        item: &FetchedItem,
    ) -> sqlx::Result<RawInsertOutcome> {
        let hash = content_hash(
            &item.url,
            item.external_id.as_deref(),
            item.title.as_deref(),
            item.published_at,
        );
        let new = NewRawSignal {
            source_kind: source.kind.to_string(),
            source_name: source.name.clone(),
            source_url: item.url.clone(),
            source_domain: extract_domain(&item.url),
            external_id: item.external_id.clone(),
            fetched_at: Utc::now(),
            content_type: item.content_type.clone(),
            payload: item.payload.clone(),
            raw_text: item.text.clone(),
            content_hash: hash,
            canonical_url: normalize_url(&item.url),
            title: truncate_with_ellipsis(item.title.as_deref().unwrap_or("Untitled"), 500),
            author: item.author.clone(),
            published_at: item.published_at,
        };
        self.store.insert_raw_signal(&new).await
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
