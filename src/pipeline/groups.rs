//! Chunk groups and cross-chunk links
//!
//! Adjacency is built once per run and walked with a breadth-first
//! search guarded by a `visited: HashSet`, so a cyclic link graph still
//! terminates. Three sequential passes: inclusive groups expand into
//! virtual boost edges, exclusive groups drop all-but-best, and a
//! mandatory exclusive-group member is force-included when absent.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::registry::collection::{ChunkGroup, ChunkLink, GroupMode, LinkType};
use crate::types::{ContentHash, ScoredChunk};

/// Soft links only propagate one hop; a farther chunk's relevance to the
/// query at hand is too indirect to be worth boosting.
const SOFT_LINK_DEPTH: usize = 1;
/// Hard (force-include) links can chain further, but always under a
/// `visited` guard since the link graph may be cyclic.
const HARD_LINK_DEPTH: usize = 4;

fn find_in_pool(pool: &[ScoredChunk], hash: ContentHash) -> Option<ScoredChunk> {
    pool.iter().find(|c| c.hash == hash).cloned()
}

/// Three-pass group scoring over the current result set. `source_pool` is
/// the broader candidate set (pre-threshold) a mandatory member may need
/// to be pulled back in from.
pub fn apply_groups(
    mut chunks: Vec<ScoredChunk>,
    groups: &[ChunkGroup],
    source_pool: &[ScoredChunk],
) -> Vec<ScoredChunk> {
    let group_by_id: HashMap<&str, &ChunkGroup> = groups.iter().map(|g| (g.id.as_str(), g)).collect();

    // Pass 1: inclusive groups expand into a virtual additive boost shared
    // by every present member, once any member is present.
    for group in groups.iter().filter(|g| g.mode == GroupMode::Inclusive) {
        let any_present = chunks
        .iter()
        .any(|c| c.chunk.metadata.chunk_group.as_deref() == Some(group.id.as_str()));
        if any_present {
            for c in chunks.iter_mut() {
                if c.chunk.metadata.chunk_group.as_deref() == Some(group.id.as_str()) {
                    c.final_score += group.boost;
                }
            }
        }
    }

    // Pass 2: exclusive groups keep only the best-scoring present member.
    let mut by_group: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, c) in chunks.iter().enumerate() {
        if let Some(gid) = &c.chunk.metadata.chunk_group {
            if matches!(group_by_id.get(gid.as_str()), Some(g) if g.mode == GroupMode::Exclusive) {
                by_group.entry(gid.clone()).or_default().push(idx);
            }
        }
    }
    let mut drop: HashSet<usize> = HashSet::new();
    for indices in by_group.values() {
        if indices.len() <= 1 {
            continue;
        }
        let best = *indices
        .iter()
        .max_by(|&&a, &&b| {
                chunks[a]
                .final_score
                .partial_cmp(&chunks[b].final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
            })
        .unwrap();
        for &idx in indices {
            if idx != best {
                drop.insert(idx);
            }
        }
    }
    if !drop.is_empty() {
        chunks = chunks
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| !drop.contains(idx))
        .map(|(_, c)| c)
        .collect();
    }

    // Pass 3: force-include a mandatory member when its exclusive group
    // has no present member at all.
    for group in groups.iter().filter(|g| g.mode == GroupMode::Exclusive) {
        let Some(mandatory) = group.mandatory_member else {
            continue;
        };
        let group_has_any = chunks
        .iter()
        .any(|c| c.chunk.metadata.chunk_group.as_deref() == Some(group.id.as_str()));
        if !group_has_any {
            if let Some(forced) = find_in_pool(source_pool, mandatory) {
                chunks.push(forced);
            }
        }
    }

    chunks
}

/// BFS over a chunk-link graph, bounded by `max_depth` and guarded by a
/// `visited` set against cycles.
fn bfs_targets(
    start: &[ContentHash],
    links: &HashMap<ContentHash, Vec<ChunkLink>>,
    link_type: LinkType,
    max_depth: usize,
) -> Vec<(ContentHash, f32)> {
    let mut visited: HashSet<ContentHash> = start.iter().copied().collect();
    let mut queue: VecDeque<(ContentHash, usize)> = start.iter().map(|&h| (h, 0)).collect();
    let mut found = Vec::new();

    while let Some((hash, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(edges) = links.get(&hash) else {
            continue;
        };
        for edge in edges.iter().filter(|e| e.link_type == link_type) {
            if visited.insert(edge.target) {
                found.push((edge.target, edge.weight));
                queue.push_back((edge.target, depth + 1));
            }
        }
    }

    found
}

/// Apply cross-chunk links: a present chunk's soft links nudge
/// already-present targets upward; its hard links force-include a target
/// even if it was otherwise dropped, pulling it from `source_pool`.
pub fn apply_links(
    mut chunks: Vec<ScoredChunk>,
    links: &HashMap<ContentHash, Vec<ChunkLink>>,
    source_pool: &[ScoredChunk],
) -> Vec<ScoredChunk> {
    let present: Vec<ContentHash> = chunks.iter().map(|c| c.hash).collect();

    for (target, weight) in bfs_targets(&present, links, LinkType::Soft, SOFT_LINK_DEPTH) {
        if let Some(c) = chunks.iter_mut().find(|c| c.hash == target) {
            c.final_score += weight;
        }
    }

    for (target, _weight) in bfs_targets(&present, links, LinkType::Hard, HARD_LINK_DEPTH) {
        if !chunks.iter().any(|c| c.hash == target) {
            if let Some(forced) = find_in_pool(source_pool, target) {
                chunks.push(forced);
            }
        }
    }

    chunks
}
