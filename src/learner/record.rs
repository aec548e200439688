//! Per-entry dependency records.
//!
//! A record is a small arena of edges owned by one entry path. Edges never
//! point back at their entry and are addressed by target path, so eviction is
//! a plain `Vec` removal.

use serde::Serialize;
use tokio::time::Instant;

use crate::asset::AssetPath;

/// A learned "entry → target" relationship.
#[derive(Debug, Clone)]
pub struct Edge {
    pub target: AssetPath,
    /// Successful observations over the edge's lifetime.
    pub observations: u64,
    /// Current weight; pushes require it to reach the threshold.
    pub confidence: u32,
    /// Last time a success confirmed this edge.
    pub last_confirmed: Instant,
}

/// Result of applying a negative outcome to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Penalty {
    /// No such edge; nothing changed.
    Missing,
    /// Confidence lowered to the contained value.
    Lowered(u32),
    /// Confidence reached zero and the edge was removed.
    Evicted,
}

/// Edges observed to follow one entry path.
#[derive(Debug, Clone)]
pub struct DependencyRecord {
    edges: Vec<Edge>,
    last_touched: Instant,
}

impl DependencyRecord {
    pub fn new(now: Instant) -> Self {
        Self {
            edges: Vec::new(),
            last_touched: now,
        }
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn last_touched(&self) -> Instant {
        self.last_touched
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, target: &AssetPath) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.target == target)
    }

    /// Reinforce (or create) the edge to `target`.
    ///
    /// Returns the evicted target when the record was full.
    pub fn confirm(
        &mut self,
        target: &AssetPath,
        now: Instant,
        max_confidence: u32,
        capacity: usize,
    ) -> Option<AssetPath> {
        self.last_touched = now;

        if let Some(edge) = self.edges.iter_mut().find(|e| &e.target == target) {
            edge.observations = edge.observations.saturating_add(1);
            edge.confidence = edge.confidence.saturating_add(1).min(max_confidence);
            edge.last_confirmed = now;
            return None;
        }

        let evicted = if self.edges.len() >= capacity {
            self.evict_weakest()
        } else {
            None
        };
        if capacity > 0 {
            self.edges.push(Edge {
                target: target.clone(),
                observations: 1,
                confidence: 1.min(max_confidence),
                last_confirmed: now,
            });
        }
        evicted
    }

    /// Mark the edge to `target` as still in use without strengthening it.
    ///
    /// Pushed assets are no longer requested by the clients that receive
    /// them, so a delivered push is what keeps a proven edge fresh.
    pub fn refresh(&mut self, target: &AssetPath, now: Instant) -> bool {
        match self.edges.iter_mut().find(|e| &e.target == target) {
            Some(edge) => {
                edge.last_confirmed = now;
                self.last_touched = now;
                true
            }
            None => false,
        }
    }

    /// Weaken the edge to `target`, removing it at zero confidence.
    pub fn penalize(&mut self, target: &AssetPath, penalty: u32, now: Instant) -> Penalty {
        let Some(idx) = self.edges.iter().position(|e| &e.target == target) else {
            return Penalty::Missing;
        };
        self.last_touched = now;

        let edge = &mut self.edges[idx];
        edge.confidence = edge.confidence.saturating_sub(penalty);
        if edge.confidence == 0 {
            self.edges.swap_remove(idx);
            Penalty::Evicted
        } else {
            Penalty::Lowered(edge.confidence)
        }
    }

    /// Targets at or above `threshold`, best first, at most `limit`.
    ///
    /// Ranking: confidence descending, then most recently confirmed, then path.
    pub fn ranked(&self, threshold: u32, limit: usize) -> Vec<AssetPath> {
        let mut eligible: Vec<&Edge> = self
            .edges
            .iter()
            .filter(|e| e.confidence >= threshold)
            .collect();
        eligible.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| b.last_confirmed.cmp(&a.last_confirmed))
                .then_with(|| a.target.cmp(&b.target))
        });
        eligible
            .into_iter()
            .take(limit)
            .map(|e| e.target.clone())
            .collect()
    }

    /// Drop the weakest edge: lowest confidence, then least recently
    /// confirmed, then path.
    fn evict_weakest(&mut self) -> Option<AssetPath> {
        let idx = self
            .edges
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.confidence
                    .cmp(&b.confidence)
                    .then_with(|| a.last_confirmed.cmp(&b.last_confirmed))
                    .then_with(|| a.target.cmp(&b.target))
            })
            .map(|(idx, _)| idx)?;
        Some(self.edges.swap_remove(idx).target)
    }

    pub fn snapshot(&self, entry: &AssetPath, now: Instant) -> EntrySnapshot {
        let mut edges: Vec<EdgeSnapshot> = self
            .edges
            .iter()
            .map(|e| EdgeSnapshot {
                target: e.target.clone(),
                observations: e.observations,
                confidence: e.confidence,
                idle_ms: now.saturating_duration_since(e.last_confirmed).as_millis() as u64,
            })
            .collect();
        edges.sort_by(|a, b| {
            b.confidence
                .cmp(&a.confidence)
                .then_with(|| a.idle_ms.cmp(&b.idle_ms))
                .then_with(|| a.target.cmp(&b.target))
        });
        EntrySnapshot {
            entry: entry.clone(),
            edges,
        }
    }
}

/// Serializable view of one entry's edges.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySnapshot {
    pub entry: AssetPath,
    pub edges: Vec<EdgeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeSnapshot {
    pub target: AssetPath,
    pub observations: u64,
    pub confidence: u32,
    pub idle_ms: u64,
}
