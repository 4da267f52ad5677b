//! In-memory reply tree for one post, rebuilt from flat parent pointers.
//!
//! Traversals are iterative with a visited set, so deep reply chains cannot blow the
//! stack and a cyclic parent chain cannot loop forever.

use crate::error::StructuralAnomaly;
use crate::records::CommentRecord;
use ahash::{AHashMap, AHashSet};

/// Strip the platform kind prefix (`t1_` comment, `t3_` post) from an id.
#[inline]
pub fn bare_id(id: &str) -> &str {
    id.strip_prefix("t1_").or_else(|| id.strip_prefix("t3_")).unwrap_or(id)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Reach {
    Post,
    Dangling,
    Cycle,
}

pub struct ThreadIndex {
    post_id: String,
    records: Vec<CommentRecord>,
    by_id: AHashMap<String, usize>,
    children: AHashMap<String, Vec<usize>>,
    anomalies: Vec<StructuralAnomaly>,
}

impl ThreadIndex {
    /// Index `records` by parent id. Duplicate comment ids keep their first occurrence.
    pub fn new(post_id: impl AsRef<str>, records: Vec<CommentRecord>) -> Self {
        let post_id = bare_id(post_id.as_ref()).to_string();
        let mut by_id: AHashMap<String, usize> = AHashMap::with_capacity(records.len());
        let mut children: AHashMap<String, Vec<usize>> = AHashMap::new();
        let mut anomalies = Vec::new();
        let mut kept = Vec::with_capacity(records.len());

        for rec in records {
            let id = bare_id(&rec.comment_id);
            if by_id.contains_key(id) {
                anomalies.push(StructuralAnomaly::DuplicateId { comment_id: id.to_string() });
                continue;
            }
            let i = kept.len();
            by_id.insert(id.to_string(), i);
            children.entry(bare_id(&rec.parent_id).to_string()).or_default().push(i);
            kept.push(rec);
        }

        let mut index = Self { post_id, records: kept, by_id, children, anomalies };
        index.classify_chains();
        for a in &index.anomalies {
            tracing::warn!(post_id = %index.post_id, anomaly = %a, "structural anomaly in thread");
        }
        index
    }

    /// Walk every indexed comment's ancestor chain once (memoized) and record the ones
    /// that never reach the post.
    fn classify_chains(&mut self) {
        let mut reach: AHashMap<usize, Reach> = AHashMap::with_capacity(self.by_id.len());
        let mut order: Vec<usize> = self.by_id.values().copied().collect();
        order.sort_unstable();

        for start in order {
            let mut path: Vec<usize> = Vec::new();
            let mut on_path: AHashSet<usize> = AHashSet::new();
            let mut cur = start;
            let outcome = loop {
                if let Some(&r) = reach.get(&cur) {
                    break r;
                }
                if !on_path.insert(cur) {
                    break Reach::Cycle;
                }
                path.push(cur);
                let parent = bare_id(&self.records[cur].parent_id);
                if parent == self.post_id {
                    break Reach::Post;
                }
                match self.by_id.get(parent) {
                    Some(&p) => cur = p,
                    None => {
                        self.anomalies.push(StructuralAnomaly::DanglingParent {
                            comment_id: bare_id(&self.records[cur].comment_id).to_string(),
                            parent_id: parent.to_string(),
                        });
                        break Reach::Dangling;
                    }
                }
            };
            for i in path {
                if outcome == Reach::Cycle && !reach.contains_key(&i) {
                    self.anomalies.push(StructuralAnomaly::Cycle {
                        comment_id: bare_id(&self.records[i].comment_id).to_string(),
                    });
                }
                reach.insert(i, outcome);
            }
        }
    }

    pub fn post_id(&self) -> &str {
        &self.post_id
    }

    pub fn records(&self) -> &[CommentRecord] {
        &self.records
    }

    pub fn anomalies(&self) -> &[StructuralAnomaly] {
        &self.anomalies
    }

    pub fn get(&self, comment_id: &str) -> Option<&CommentRecord> {
        self.by_id.get(bare_id(comment_id)).map(|&i| &self.records[i])
    }

    fn child_indices(&self, node_id: &str) -> &[usize] {
        self.children.get(bare_id(node_id)).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct replies to `node_id`, in source order.
    pub fn replies_to(&self, node_id: &str) -> Vec<&CommentRecord> {
        self.child_indices(node_id).iter().map(|&i| &self.records[i]).collect()
    }

    pub fn top_level_replies(&self) -> Vec<&CommentRecord> {
        self.replies_to(&self.post_id)
    }

    /// Every comment reachable below `node_id`, excluding `node_id` itself.
    pub fn descendants_of(&self, node_id: &str) -> Vec<&CommentRecord> {
        let start = bare_id(node_id);
        let mut seen: AHashSet<usize> = AHashSet::new();
        let mut out = Vec::new();
        let mut frontier: Vec<usize> = self.child_indices(start).to_vec();
        while let Some(i) = frontier.pop() {
            let rec = &self.records[i];
            if !seen.insert(i) || bare_id(&rec.comment_id) == start {
                tracing::warn!(post_id = %self.post_id, node = start, comment_id = %rec.comment_id, "reply chain loops back; not following");
                continue;
            }
            out.push(rec);
            frontier.extend_from_slice(self.child_indices(&rec.comment_id));
        }
        out
    }

    /// Length of the longest reply chain below `node_id`; 0 for a leaf.
    pub fn max_depth_under(&self, node_id: &str) -> usize {
        let start = bare_id(node_id);
        let mut seen: AHashSet<usize> = AHashSet::new();
        let mut best = 0usize;
        let mut stack: Vec<(usize, usize)> = self.child_indices(start).iter().map(|&c| (c, 1)).collect();
        while let Some((i, depth)) = stack.pop() {
            let rec = &self.records[i];
            if !seen.insert(i) || bare_id(&rec.comment_id) == start {
                continue;
            }
            best = best.max(depth);
            stack.extend(self.child_indices(&rec.comment_id).iter().map(|&c| (c, depth + 1)));
        }
        best
    }
}
