//! Process-wide dependency learner.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::time::Instant;

use crate::asset::AssetPath;
use crate::config::{LearnerConfig, PushSettings};
use crate::learner::record::{DependencyRecord, EntrySnapshot, Penalty};
use crate::observability::metrics;

/// Bounds and thresholds the learner applies; swappable at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerLimits {
    pub push_threshold: u32,
    pub max_confidence: u32,
    pub failure_penalty: u32,
    pub max_dependencies_per_entry: usize,
    pub max_entries: usize,
    pub max_fan_out: usize,
}

impl LearnerLimits {
    pub fn new(learner: &LearnerConfig, push: &PushSettings) -> Self {
        Self {
            push_threshold: learner.push_threshold,
            max_confidence: learner.max_confidence,
            failure_penalty: learner.failure_penalty,
            max_dependencies_per_entry: learner.max_dependencies_per_entry,
            max_entries: learner.max_entries,
            max_fan_out: push.max_fan_out,
        }
    }
}

impl Default for LearnerLimits {
    fn default() -> Self {
        Self::new(&LearnerConfig::default(), &PushSettings::default())
    }
}

/// Learns which assets follow which entry paths.
///
/// Records are sharded by entry path, so updates for unrelated entries do
/// not contend.
pub struct DependencyLearner {
    records: DashMap<AssetPath, DependencyRecord>,
    limits: ArcSwap<LearnerLimits>,
}

impl DependencyLearner {
    pub fn new(limits: LearnerLimits) -> Self {
        Self {
            records: DashMap::new(),
            limits: ArcSwap::from_pointee(limits),
        }
    }

    /// Replace the limits; existing records are trimmed lazily on next touch.
    pub fn reload(&self, limits: LearnerLimits) {
        self.limits.store(Arc::new(limits));
    }

    pub fn limits(&self) -> Arc<LearnerLimits> {
        self.limits.load_full()
    }

    /// Record that `requested` was fetched after `entry`.
    ///
    /// Success reinforces (or creates) the edge; failure only ever weakens an
    /// existing edge and evicts it once its confidence reaches zero.
    pub fn record_outcome(&self, entry: &AssetPath, requested: &AssetPath, success: bool) {
        self.record_outcome_at(entry, requested, success, Instant::now());
    }

    pub(crate) fn record_outcome_at(
        &self,
        entry: &AssetPath,
        requested: &AssetPath,
        success: bool,
        now: Instant,
    ) {
        if entry == requested {
            return;
        }
        let limits = self.limits.load();

        if success {
            let evicted = {
                let mut record = self
                    .records
                    .entry(entry.clone())
                    .or_insert_with(|| DependencyRecord::new(now));
                record.confirm(
                    requested,
                    now,
                    limits.max_confidence,
                    limits.max_dependencies_per_entry,
                )
            };
            if let Some(target) = evicted {
                tracing::debug!(entry = %entry, target = %target, "Dependency evicted at capacity");
            }
            if self.records.len() > limits.max_entries {
                self.evict_entries(limits.max_entries);
            }
            metrics::record_learned_entries(self.records.len());
            return;
        }

        let outcome = match self.records.get_mut(entry) {
            Some(mut record) => record.penalize(requested, limits.failure_penalty, now),
            None => Penalty::Missing,
        };
        match outcome {
            Penalty::Missing => {}
            Penalty::Lowered(confidence) => {
                tracing::debug!(entry = %entry, target = %requested, confidence, "Dependency weakened");
            }
            Penalty::Evicted => {
                tracing::debug!(entry = %entry, target = %requested, "Dependency dropped after failures");
                self.records.remove_if(entry, |_, record| record.is_empty());
                metrics::record_learned_entries(self.records.len());
            }
        }
    }

    /// Record that a push of `target` for `entry` reached the client.
    ///
    /// Keeps the edge from ageing out without raising its confidence.
    pub fn record_delivery(&self, entry: &AssetPath, target: &AssetPath) {
        let now = Instant::now();
        if let Some(mut record) = self.records.get_mut(entry) {
            record.refresh(target, now);
        }
    }

    /// Assets to push for `entry`, best first, never more than the fan-out.
    pub fn suggested_push_set(&self, entry: &AssetPath) -> Vec<AssetPath> {
        let limits = self.limits.load();
        self.records
            .get(entry)
            .map(|record| record.ranked(limits.push_threshold, limits.max_fan_out))
            .unwrap_or_default()
    }

    /// Current confidence of one edge, if learned.
    pub fn confidence(&self, entry: &AssetPath, target: &AssetPath) -> Option<u32> {
        self.records
            .get(entry)
            .and_then(|record| record.edge(target).map(|edge| edge.confidence))
    }

    pub fn entry_count(&self) -> usize {
        self.records.len()
    }

    /// Point-in-time view of everything learned, ordered by entry path.
    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        let now = Instant::now();
        let mut entries: Vec<EntrySnapshot> = self
            .records
            .iter()
            .map(|r| r.value().snapshot(r.key(), now))
            .collect();
        entries.sort_by(|a, b| a.entry.cmp(&b.entry));
        entries
    }

    /// Forget everything learned.
    pub fn clear(&self) {
        self.records.clear();
        metrics::record_learned_entries(0);
    }

    /// Drop the least recently touched entries until at most `max` remain.
    fn evict_entries(&self, max: usize) {
        let mut by_age: Vec<(AssetPath, Instant)> = self
            .records
            .iter()
            .map(|r| (r.key().clone(), r.value().last_touched()))
            .collect();
        if by_age.len() <= max {
            return;
        }
        by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let excess = by_age.len() - max;
        for (entry, _) in by_age.into_iter().take(excess) {
            self.records.remove(&entry);
            tracing::debug!(entry = %entry, "Entry evicted at capacity");
        }
    }
}

impl Default for DependencyLearner {
    fn default() -> Self {
        Self::new(LearnerLimits::default())
    }
}
