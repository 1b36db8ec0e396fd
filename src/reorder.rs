//! Pinned-first ordering of the host list.
//!
//! The target order is a stable partition of the container's children: pinned
//! rows in pin order, then everything else in its current relative order. Only
//! children whose position differs from the target are moved.

use crate::error::HostError;
use crate::host::{self, HostDocument, NodeId};
use crate::identity::PIN_ID_ATTR;
use crate::reconciler::TOGGLE_CLASS;
use std::collections::{HashMap, HashSet};

/// How far up from the first row the container search goes.
pub const MAX_CONTAINER_DEPTH: usize = 10;

/// Whether `child` is, or wraps, one of the rows: a scanned row, a tagged row or
/// a toggle control.
fn is_candidate_row<D: HostDocument + ?Sized>(doc: &D, child: NodeId, rows: &HashSet<NodeId>) -> bool {
    let looks_like_row = |n: NodeId| {
        rows.contains(&n)
            || doc.attribute(n, PIN_ID_ATTR).is_some()
            || host::has_class(doc, n, TOGGLE_CLASS)
    };
    looks_like_row(child) || host::descendants(doc, child).into_iter().any(looks_like_row)
}

/// The element whose children are the rows.
///
/// Walks up from the first row's parent to the first ancestor with more than
/// one candidate row among its direct children, falling back to the first
/// row's parent.
pub fn find_container<D: HostDocument + ?Sized>(doc: &D, rows: &[NodeId]) -> Option<NodeId> {
    let first = *rows.first()?;
    let fallback = doc.parent(first)?;
    let row_set: HashSet<NodeId> = rows.iter().copied().collect();

    let root = doc.root();
    let mut current = Some(fallback);
    let mut depth = 0;
    while let Some(node) = current {
        if node == root || depth >= MAX_CONTAINER_DEPTH {
            break;
        }
        let count = doc
            .children(node)
            .into_iter()
            .filter(|&c| is_candidate_row(doc, c, &row_set))
            .take(2)
            .count();
        if count > 1 {
            return Some(node);
        }
        current = doc.parent(node);
        depth += 1;
    }
    Some(fallback)
}

/// Target order for `children`. `pin_index` gives a child's position in the
/// pinned-set, `None` for unpinned children.
pub fn plan<F>(children: &[NodeId], pin_index: F) -> Vec<NodeId>
where
    F: Fn(NodeId) -> Option<usize>,
{
    let mut pinned: Vec<(usize, usize, NodeId)> = Vec::new();
    let mut rest: Vec<NodeId> = Vec::with_capacity(children.len());
    for (position, &child) in children.iter().enumerate() {
        match pin_index(child) {
            Some(index) => pinned.push((index, position, child)),
            None => rest.push(child),
        }
    }
    // Document position breaks ties between rows sharing a pin index
    pinned.sort_unstable_by_key(|&(index, position, _)| (index, position));

    let mut target: Vec<NodeId> = pinned.into_iter().map(|(_, _, c)| c).collect();
    target.extend(rest);
    target
}

/// Indices into `seq` of one longest strictly increasing subsequence.
fn longest_increasing(seq: &[usize]) -> Vec<usize> {
    // tails[k] is the index of the smallest tail among increasing runs of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < value);
        if k > 0 {
            prev[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut next = tails.last().copied();
    while let Some(i) = next {
        run.push(i);
        next = prev[i];
    }
    run.reverse();
    run
}

/// Move children of `container` into `target` order. Returns the number of moves.
///
/// Children on a longest run that is already in target order stay put; every
/// other child is moved once, so the move count is the minimum possible.
/// `target` must be a permutation of the container's current children.
pub fn apply<D: HostDocument + ?Sized>(
    doc: &mut D,
    container: NodeId,
    target: &[NodeId],
) -> Result<usize, HostError> {
    let current = doc.children(container);
    let position: HashMap<NodeId, usize> =
        target.iter().enumerate().map(|(i, &node)| (node, i)).collect();
    let permutation = current.len() == target.len()
        && position.len() == target.len()
        && current.iter().all(|c| position.contains_key(c));
    if !permutation {
        return Err(HostError::InvalidOperation(format!(
            "reorder target ({} children) is not a permutation of container {:?} ({} children)",
            target.len(),
            container,
            current.len()
        )));
    }

    let seq: Vec<usize> = current.iter().map(|c| position[c]).collect();
    let mut stays = vec![false; target.len()];
    for i in longest_increasing(&seq) {
        stays[seq[i]] = true;
    }

    // Back to front: everything after `anchor` is already in target order
    let mut moves = 0;
    let mut anchor = None;
    for (i, &node) in target.iter().enumerate().rev() {
        if !stays[i] {
            doc.insert_before(container, node, anchor)?;
            moves += 1;
        }
        anchor = Some(node);
    }
    Ok(moves)
}

/// The direct child of `container` that is `node` or contains it.
fn child_of<D: HostDocument + ?Sized>(doc: &D, container: NodeId, node: NodeId) -> Option<NodeId> {
    let mut current = node;
    loop {
        let parent = doc.parent(current)?;
        if parent == container {
            return Some(current);
        }
        current = parent;
    }
}

/// Plan and apply a pinned-first order for the container of `rows`.
///
/// `pin_index` maps a row id to its position in the pinned-set. Returns the
/// number of moves, 0 when there is nothing to do.
pub fn reorder<D, F>(doc: &mut D, rows: &[NodeId], pin_index: F) -> Result<usize, HostError>
where
    D: HostDocument + ?Sized,
    F: Fn(&str) -> Option<usize>,
{
    let Some(container) = find_container(doc, rows) else {
        return Ok(0);
    };
    let children = doc.children(container);
    // A row may sit inside a wrapper that is the actual container child
    let wrapped: HashMap<NodeId, &str> = rows
        .iter()
        .filter_map(|&row| {
            let item = child_of(doc, container, row)?;
            Some((item, doc.attribute(row, PIN_ID_ATTR)?))
        })
        .collect();
    let target = plan(&children, |child| {
        wrapped
            .get(&child)
            .copied()
            .or_else(|| doc.attribute(child, PIN_ID_ATTR))
            .and_then(&pin_index)
    });
    if target == children {
        return Ok(0);
    }
    let moves = apply(doc, container, &target)?;
    crate::debug_log!("REORDER", "Reordered {:?} with {} moves", container, moves);
    Ok(moves)
}
