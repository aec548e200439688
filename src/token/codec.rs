//! Cache-state token codec.
//!
//! Wire format, version 1:
//!
//! ```text
//! "1." + base64url_nopad( json( [[path, generation], ...] ) )
//! ```
//!
//! Members are written sorted by path. The generation number records when a
//! member was added; every member added by the same push decision shares one
//! generation, so equal sets encode to equal tokens whatever the order they
//! were inserted in.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::collections::{BTreeMap, BTreeSet};

use crate::asset::AssetPath;

/// Current token format version.
pub const TOKEN_VERSION: &str = "1";

/// Assets the client is believed to hold, with per-member recency.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheState {
    members: BTreeMap<AssetPath, u32>,
}

impl CacheState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, path: &AssetPath) -> bool {
        self.members.contains_key(path)
    }

    /// Members in path order.
    pub fn iter(&self) -> impl Iterator<Item = &AssetPath> {
        self.members.keys()
    }

    /// Newest generation present (0 when empty).
    pub fn generation(&self) -> u32 {
        self.members.values().copied().max().unwrap_or(0)
    }

    /// Add a batch of paths as one new generation.
    ///
    /// Members already present are refreshed to the new generation.
    pub fn insert_batch<'a, I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = &'a AssetPath>,
    {
        let mut paths = paths.into_iter().peekable();
        if paths.peek().is_none() {
            return;
        }
        if self.generation() == u32::MAX {
            self.compact();
        }
        let next = self.generation() + 1;
        for path in paths {
            self.members.insert(path.clone(), next);
        }
    }

    /// Renumber generations densely from 1, keeping their relative order.
    fn compact(&mut self) {
        let distinct: BTreeSet<u32> = self.members.values().copied().collect();
        let rank: BTreeMap<u32, u32> = distinct
            .into_iter()
            .zip(1u32..)
            .collect();
        for generation in self.members.values_mut() {
            *generation = rank[&*generation];
        }
    }

    fn insert_raw(&mut self, path: AssetPath, generation: u32) {
        let slot = self.members.entry(path).or_insert(generation);
        *slot = (*slot).max(generation);
    }
}

/// Result of decoding a client token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decoded {
    pub state: CacheState,
    /// Set when the token was present but unusable and has been discarded.
    pub reset: bool,
}

impl Decoded {
    fn reset() -> Self {
        Self {
            state: CacheState::new(),
            reset: true,
        }
    }
}

/// Encodes and decodes cache-state tokens under a size bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCodec {
    max_token_bytes: usize,
}

impl TokenCodec {
    pub fn new(max_token_bytes: usize) -> Self {
        Self { max_token_bytes }
    }

    pub fn max_token_bytes(&self) -> usize {
        self.max_token_bytes
    }

    /// Decode a client token. Never fails.
    pub fn decode(&self, token: &str) -> Decoded {
        let token = token.trim();
        if token.is_empty() {
            return Decoded::default();
        }
        if token.len() > self.max_token_bytes {
            return Decoded::reset();
        }

        let Some((version, payload)) = token.split_once('.') else {
            return Decoded::reset();
        };
        if version != TOKEN_VERSION {
            return Decoded::reset();
        }
        let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload) else {
            return Decoded::reset();
        };
        let Ok(entries) = serde_json::from_slice::<Vec<(String, u32)>>(&bytes) else {
            return Decoded::reset();
        };

        let mut state = CacheState::new();
        for (path, generation) in entries {
            match AssetPath::from_canonical(&path) {
                Ok(path) => state.insert_raw(path, generation),
                Err(_) => return Decoded::reset(),
            }
        }
        Decoded {
            state,
            reset: false,
        }
    }

    /// Encode a state into a token no longer than the configured bound.
    ///
    /// When the full state does not fit, the least recently added members are
    /// dropped until it does. An empty state encodes to the empty string.
    pub fn encode(&self, state: &CacheState) -> String {
        if state.is_empty() {
            return String::new();
        }
        let full = render(state.members.iter());
        if full.len() <= self.max_token_bytes {
            return full;
        }

        // Keep order: newest generation first, ties by path descending, so the
        // drop order is oldest first with ties by path ascending.
        let mut keep_order: Vec<(&AssetPath, &u32)> = state.members.iter().collect();
        keep_order.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));

        // Largest prefix of keep_order that fits; length is monotonic in k.
        let (mut lo, mut hi) = (0usize, keep_order.len() - 1);
        let mut best = String::new();
        while lo < hi {
            let mid = lo + (hi - lo + 1) / 2;
            let candidate = render(keep_order[..mid].iter().copied());
            if candidate.len() <= self.max_token_bytes {
                lo = mid;
                best = candidate;
            } else {
                hi = mid - 1;
            }
        }
        best
    }
}

/// Serialize members in path order.
fn render<'a, I>(members: I) -> String
where
    I: Iterator<Item = (&'a AssetPath, &'a u32)>,
{
    let mut entries: Vec<(&str, u32)> = members.map(|(p, g)| (p.as_str(), *g)).collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    match serde_json::to_vec(&entries) {
        Ok(json) => format!("{}.{}", TOKEN_VERSION, URL_SAFE_NO_PAD.encode(json)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize cache state");
            String::new()
        }
    }
}
