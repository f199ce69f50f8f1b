//! Sharded fuzzy search over leaf marks.
//!
//! The corpus is split into fixed-capacity shards. A scan visits one shard at
//! a time and yields to the scheduler before each, so a newer keystroke can
//! take over. After every shard the partial result is merged and published.
//! A scan whose query is no longer current publishes what it has and stops;
//! publishes are tagged with a query generation and never replace results of
//! a newer generation.

pub mod fuzzy;

use std::sync::Arc;

use tokio::sync::watch;

use crate::models::NodeId;

pub const DEFAULT_SHARD_CAPACITY: usize = 1000;
/// Maximum number of hits kept per shard and in the merged list.
pub const RESULT_LIMIT: usize = 32;
/// Maximum number of initial candidates shown for an empty query.
pub const INITIAL_PREVIEW: usize = 15;

/// One searchable leaf, keyed by its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEntry {
    pub node: NodeId,
    pub mark_id: String,
    pub name: String,
    pub file_path: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub entry: Arc<SearchEntry>,
    pub score: i64,
}

/// The latest list published to the view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub generation: u64,
    pub query: String,
    pub hits: Vec<SearchHit>,
    /// Every shard has been scanned for `query`.
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// All shards scanned.
    Completed,
    /// A newer query arrived; partial results were flushed.
    Superseded,
    /// The query was empty and the initial candidates were restored.
    Restored,
}

#[derive(Debug, Clone, Default)]
struct ActiveQuery {
    generation: u64,
    text: String,
}

#[derive(Debug)]
struct Shard {
    entries: Vec<Arc<SearchEntry>>,
}

impl Shard {
    /// Best matches in this shard, highest score first, shorter names first
    /// among equal scores.
    fn find(&self, query: &str) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .entries
            .iter()
            .filter_map(|entry| {
                fuzzy::score(query, &entry.name).map(|score| SearchHit {
                    entry: Arc::clone(entry),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.entry.name.chars().count().cmp(&b.entry.name.chars().count()))
        });
        hits.truncate(RESULT_LIMIT);
        hits
    }
}

/// Merge two descending lists into one, capped at [`RESULT_LIMIT`]. On equal
/// scores the accumulated side goes first.
pub fn merge(accumulated: Vec<SearchHit>, incoming: Vec<SearchHit>) -> Vec<SearchHit> {
    if accumulated.is_empty() {
        let mut incoming = incoming;
        incoming.truncate(RESULT_LIMIT);
        return incoming;
    }
    if incoming.is_empty() {
        return accumulated;
    }

    let mut out = Vec::with_capacity(RESULT_LIMIT.min(accumulated.len() + incoming.len()));
    let mut left = accumulated.into_iter().peekable();
    let mut right = incoming.into_iter().peekable();
    while out.len() < RESULT_LIMIT {
        let take_left = match (left.peek(), right.peek()) {
            (None, None) => break,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(l), Some(r)) => l.score >= r.score,
        };
        let next = if take_left { left.next() } else { right.next() };
        out.extend(next);
    }
    out
}

#[derive(Debug, Clone)]
pub struct SearchIndex {
    shards: Arc<Vec<Shard>>,
    initial: Arc<Vec<SearchHit>>,
    active: Arc<watch::Sender<ActiveQuery>>,
    results: Arc<watch::Sender<SearchResults>>,
}

impl SearchIndex {
    /// Index `entries` in shards of [`DEFAULT_SHARD_CAPACITY`]. `initial` is
    /// shown whenever the query is empty.
    pub fn new(entries: Vec<SearchEntry>, initial: Vec<SearchEntry>) -> Self {
        Self::with_capacity(entries, initial, DEFAULT_SHARD_CAPACITY)
    }

    pub fn with_capacity(
        entries: Vec<SearchEntry>,
        initial: Vec<SearchEntry>,
        capacity: usize,
    ) -> Self {
        let entries: Vec<Arc<SearchEntry>> = entries.into_iter().map(Arc::new).collect();
        let shards: Vec<Shard> = entries
            .chunks(capacity.max(1))
            .map(|chunk| Shard {
                entries: chunk.to_vec(),
            })
            .collect();
        let initial: Vec<SearchHit> = initial
            .into_iter()
            .take(INITIAL_PREVIEW)
            .map(|entry| SearchHit {
                entry: Arc::new(entry),
                score: 0,
            })
            .collect();
        tracing::debug!(
            "Indexed {} marks in {} shards",
            entries.len(),
            shards.len()
        );

        let (active, _) = watch::channel(ActiveQuery::default());
        let (results, _) = watch::channel(SearchResults {
            generation: 0,
            query: String::new(),
            hits: initial.clone(),
            complete: true,
        });
        Self {
            shards: Arc::new(shards),
            initial: Arc::new(initial),
            active: Arc::new(active),
            results: Arc::new(results),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn initial(&self) -> &[SearchHit] {
        &self.initial
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchResults> {
        self.results.subscribe()
    }

    /// Snapshot of the latest published results.
    pub fn results(&self) -> SearchResults {
        self.results.borrow().clone()
    }

    /// Record a new query text and return its generation. An empty query
    /// restores the initial candidates right away.
    pub fn set_query(&self, text: &str) -> u64 {
        let mut generation = 0;
        self.active.send_modify(|active| {
            active.generation += 1;
            active.text = text.to_string();
            generation = active.generation;
        });
        if text.is_empty() {
            self.publish(generation, text, self.initial.to_vec(), true);
        }
        generation
    }

    pub fn is_current(&self, generation: u64, query: &str) -> bool {
        let active = self.active.borrow();
        active.generation == generation && active.text == query
    }

    /// Set the query and scan for it.
    pub async fn search(&self, text: &str) -> ScanOutcome {
        let generation = self.set_query(text);
        if text.is_empty() {
            return ScanOutcome::Restored;
        }
        self.scan(generation, text).await
    }

    /// Scan every shard for `query`, publishing merged results after each
    /// one. Stops early once `generation` is no longer the active query.
    pub async fn scan(&self, generation: u64, query: &str) -> ScanOutcome {
        let mut merged: Vec<SearchHit> = Vec::new();
        for shard in self.shards.iter() {
            tokio::task::yield_now().await;
            if !self.is_current(generation, query) {
                tracing::debug!("Query {:?} superseded, flushing partial results", query);
                self.publish(generation, query, merged, false);
                return ScanOutcome::Superseded;
            }
            merged = merge(merged, shard.find(query));
            self.publish(generation, query, merged.clone(), false);
        }
        self.publish(generation, query, merged, true);
        ScanOutcome::Completed
    }

    fn publish(&self, generation: u64, query: &str, hits: Vec<SearchHit>, complete: bool) {
        self.results.send_if_modified(|current| {
            if current.generation > generation {
                return false;
            }
            *current = SearchResults {
                generation,
                query: query.to_string(),
                hits,
                complete,
            };
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(name: &str, score: i64) -> SearchHit {
        SearchHit {
            entry: Arc::new(SearchEntry {
                node: crate::models::MarkTree::with_root().root(),
                mark_id: name.to_string(),
                name: name.to_string(),
                file_path: String::new(),
                line: 0,
            }),
            score,
        }
    }

    fn names(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.entry.name.as_str()).collect()
    }

    #[test]
    fn merge_orders_by_descending_score() {
        let merged = merge(
            vec![hit("a", 90), hit("b", 50)],
            vec![hit("c", 70), hit("d", 10)],
        );
        assert_eq!(names(&merged), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn merge_ties_favor_accumulated_side() {
        let merged = merge(vec![hit("old", 40)], vec![hit("new", 40)]);
        assert_eq!(names(&merged), vec!["old", "new"]);
    }

    #[test]
    fn merge_caps_at_result_limit() {
        let left: Vec<_> = (0..30).map(|i| hit("l", 100 - i)).collect();
        let right: Vec<_> = (0..30).map(|i| hit("r", 100 - i)).collect();
        assert_eq!(merge(left, right).len(), RESULT_LIMIT);
    }

    #[test]
    fn shard_breaks_ties_by_shorter_name() {
        let root = crate::models::MarkTree::with_root().root();
        let entry = |name: &str| {
            Arc::new(SearchEntry {
                node: root,
                mark_id: name.to_string(),
                name: name.to_string(),
                file_path: String::new(),
                line: 0,
            })
        };
        let shard = Shard {
            entries: vec![entry("abc-long"), entry("abc")],
        };
        let hits = shard.find("abc");
        assert_eq!(names(&hits), vec!["abc", "abc-long"]);
    }

    #[test]
    fn scan_for_a_replaced_query_stops_before_the_first_shard() {
        let root = crate::models::MarkTree::with_root().root();
        let entry = SearchEntry {
            node: root,
            mark_id: "a".to_string(),
            name: "alpha".to_string(),
            file_path: String::new(),
            line: 0,
        };
        let index = SearchIndex::new(vec![entry], Vec::new());
        let stale = index.set_query("al");
        index.set_query("alp");

        let outcome = tokio_test::block_on(index.scan(stale, "al"));
        assert_eq!(outcome, ScanOutcome::Superseded);
        assert!(index.results().hits.is_empty());
        assert!(!index.results().complete);
    }
}
