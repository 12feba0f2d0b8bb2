//! Query API over a [`CorpusSnapshot`].
//!
//! | Operation | Returns |
//! |-----------|---------|
//! | [`resolve`](CorpusSnapshot::resolve) | the document an id, path, or title names |
//! | [`related_to`](CorpusSnapshot::related_to) | related-edge neighbours, then group members |
//! | [`traverse`](CorpusSnapshot::traverse) | documents reachable over reference edges |
//!
//! Lookups that match nothing return [`NotFound`]; that is an expected
//! outcome, not a failure of the snapshot.

use std::collections::{HashSet, VecDeque};

use crate::dedup::normalize_title;
use crate::error::NotFound;
use crate::ids::normalize_id;
use crate::models::{Document, EdgeKind, TitleSource};
use crate::snapshot::CorpusSnapshot;

impl CorpusSnapshot {
    /// Resolve an id, a path, or a title to a document.
    ///
    /// Tried in order:
    /// 1. exact id;
    /// 2. normalized path (`./Guides\Setup.md` → `guides/setup`), including
    ///    a directory's `readme` or `index`;
    /// 3. path suffix on `/` boundaries (`setup` finds `guides/setup`);
    ///    the shortest id wins, then the lexicographically smaller;
    /// 4. heading title, preferring canonical documents.
    pub fn resolve(&self, query: &str) -> Result<&Document, NotFound> {
        self.resolve_index(query)
            .map(|i| &self.documents[i])
            .ok_or_else(|| NotFound::new(query))
    }

    fn resolve_index(&self, query: &str) -> Option<usize> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if let Some(i) = self.index_of(query) {
            return Some(i);
        }

        let normalized = normalize_id(query);
        if normalized.is_empty() {
            return None;
        }
        for candidate in [
            normalized.clone(),
            format!("{}/readme", normalized),
            format!("{}/index", normalized),
        ] {
            if let Some(i) = self.index_of(&candidate) {
                return Some(i);
            }
        }

        let suffix = format!("/{}", normalized);
        let by_suffix = self
            .documents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.id.ends_with(&suffix))
            .min_by(|(_, a), (_, b)| a.id.len().cmp(&b.id.len()).then(a.id.cmp(&b.id)))
            .map(|(i, _)| i);
        if by_suffix.is_some() {
            return by_suffix;
        }

        let title = normalize_title(query);
        if title.is_empty() {
            return None;
        }
        self.documents
            .iter()
            .enumerate()
            .filter(|(_, d)| d.title_source == TitleSource::Heading)
            .filter(|(_, d)| normalize_title(&d.title) == title)
            .min_by(|(_, a), (_, b)| {
                b.is_canonical()
                    .cmp(&a.is_canonical())
                    .then(a.preference_key().cmp(&b.preference_key()))
            })
            .map(|(i, _)| i)
    }

    /// Documents related to `id`.
    ///
    /// Outbound `related` edges first, then inbound `related` edges (each in
    /// id order), then the other members of the document's canonical group
    /// in preference order. The document itself is never included and no
    /// document appears twice.
    pub fn related_to(&self, id: &str) -> Result<Vec<&Document>, NotFound> {
        let start = self.resolve_index(id).ok_or_else(|| NotFound::new(id))?;

        let mut seen = HashSet::from([start]);
        let mut related = Vec::new();
        let neighbours = self
            .graph
            .outbound(start, EdgeKind::Related)
            .chain(self.graph.inbound(start, EdgeKind::Related));
        for i in neighbours {
            if seen.insert(i) {
                related.push(&self.documents[i]);
            }
        }

        if let Some(group) = self.group_at(start) {
            for member in &group.members {
                if let Some(i) = self.index_of(member) {
                    if seen.insert(i) {
                        related.push(&self.documents[i]);
                    }
                }
            }
        }
        Ok(related)
    }

    /// Breadth-first walk over outbound `reference` edges from `id`.
    ///
    /// The start document is included at depth 0; neighbours are visited in
    /// id order and each document appears once, so cycles terminate.
    pub fn traverse(&self, id: &str, max_depth: usize) -> Result<Vec<&Document>, NotFound> {
        Ok(self
            .traverse_with_depth(id, max_depth)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect())
    }

    /// Like [`traverse`](Self::traverse), paired with each document's depth.
    pub fn traverse_with_depth(
        &self,
        id: &str,
        max_depth: usize,
    ) -> Result<Vec<(usize, &Document)>, NotFound> {
        let start = self.resolve_index(id).ok_or_else(|| NotFound::new(id))?;

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut order = Vec::new();
        while let Some((node, depth)) = queue.pop_front() {
            order.push((depth, &self.documents[node]));
            if depth == max_depth {
                continue;
            }
            for next in self.graph.outbound(node, EdgeKind::Reference) {
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }
        Ok(order)
    }
}
