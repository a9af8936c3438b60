//! Tree builder and position coder.
//!
//! The flat list is turned into an arena: every record becomes a [`TreeNode`]
//! at its input position, and parent/child links are indices into that arena.
//! Nothing is ever dropped. Records whose parent cannot be used are demoted to
//! roots and reported.

use std::{
    collections::{HashMap, HashSet},
    hash::Hash,
};

use crate::{Diagnostic, ItemId, LineItem, WbsCode};

/// Index of a node inside a [`Forest`] or [`ProcessedTree`](crate::ProcessedTree).
pub type NodeIndex = usize;

/// Why a parent reference was not followed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LinkIssue {
    /// The parent key matches no record.
    Dangling,
    /// The parent record cannot hold children.
    NotContainer,
    /// Following parents from the record leads back to it.
    Cycle,
    /// The record's own key was already taken by an earlier record.
    Duplicate,
}

/// Resolved parent positions, one per input record.
pub(crate) struct ParentLinks {
    pub(crate) parents: Vec<Option<usize>>,
    pub(crate) issues: Vec<(usize, LinkIssue)>,
}

/// Resolves `parent_keys[i]` to the position of the record whose key matches.
///
/// Shared by stored items (keyed by id) and import rows (keyed by code).
/// The first record carrying a key owns it. Dangling, non-container and
/// cyclic references resolve to `None`; in a cycle the record that comes first
/// in the input is the one demoted.
pub(crate) fn resolve_parents<K: Eq + Hash>(
    keys: &[K],
    parent_keys: &[Option<K>],
    is_container: impl Fn(usize) -> bool,
) -> ParentLinks {
    let mut issues = Vec::new();
    let mut index: HashMap<&K, usize> = HashMap::with_capacity(keys.len());
    for (position, key) in keys.iter().enumerate() {
        if index.contains_key(key) {
            issues.push((position, LinkIssue::Duplicate));
        } else {
            index.insert(key, position);
        }
    }

    let mut parents = Vec::with_capacity(parent_keys.len());
    for (position, parent_key) in parent_keys.iter().enumerate() {
        let resolved = match parent_key.as_ref().map(|key| index.get(key)) {
            None => None,
            Some(None) => {
                issues.push((position, LinkIssue::Dangling));
                None
            }
            Some(Some(&parent)) if parent != position && !is_container(parent) => {
                issues.push((position, LinkIssue::NotContainer));
                None
            }
            Some(Some(&parent)) => Some(parent),
        };
        parents.push(resolved);
    }

    // Links are only ever removed below, so a cycle broken once stays broken.
    for start in 0..parents.len() {
        let mut seen = HashSet::from([start]);
        let mut cursor = parents[start];
        while let Some(node) = cursor {
            if node == start {
                parents[start] = None;
                issues.push((start, LinkIssue::Cycle));
                break;
            }
            if !seen.insert(node) {
                break;
            }
            cursor = parents[node];
        }
    }

    ParentLinks { parents, issues }
}

/// Orders sibling positions by their sort key, ties by input position.
pub(crate) fn sort_siblings<T: Ord>(siblings: &mut [usize], key: impl Fn(usize) -> T) {
    siblings.sort_by_key(|&position| (key(position), position));
}

/// A line item placed in the hierarchy.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub item: LineItem,
    /// Roots are at depth 0.
    pub depth: usize,
    pub wbs_code: WbsCode,
    pub parent: Option<NodeIndex>,
    /// Sorted by `order`.
    pub children: Vec<NodeIndex>,
}

/// The hierarchy rebuilt from a flat list. Node `i` is input record `i`.
#[derive(Clone, Debug, Default)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeIndex>,
    index: HashMap<ItemId, NodeIndex>,
}

/// Builds the forest and assigns depths and position codes.
///
/// The input is not modified. Every record appears exactly once in the
/// output; structural problems are returned as diagnostics.
pub fn build_forest(items: &[LineItem]) -> (Forest, Vec<Diagnostic>) {
    let ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
    let parent_ids: Vec<Option<ItemId>> = items.iter().map(|item| item.parent_id).collect();
    let links = resolve_parents(&ids, &parent_ids, |position| items[position].is_category());

    let diagnostics: Vec<Diagnostic> = links
        .issues
        .iter()
        .map(|&(position, issue)| {
            let item = &items[position];
            let parent_id = item.parent_id.unwrap_or(item.id);
            match issue {
                LinkIssue::Dangling => Diagnostic::DanglingParent {
                    id: item.id,
                    parent_id,
                },
                LinkIssue::NotContainer => Diagnostic::ParentNotCategory {
                    id: item.id,
                    parent_id,
                },
                LinkIssue::Cycle => Diagnostic::CycleBroken { id: item.id },
                LinkIssue::Duplicate => Diagnostic::DuplicateId { id: item.id },
            }
        })
        .collect();
    for diagnostic in &diagnostics {
        diagnostic.log();
    }

    let mut index = HashMap::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        index.entry(item.id).or_insert(position);
    }

    let mut children: Vec<Vec<NodeIndex>> = vec![Vec::new(); items.len()];
    let mut roots = Vec::new();
    for (position, parent) in links.parents.iter().enumerate() {
        match parent {
            Some(parent) => children[*parent].push(position),
            None => roots.push(position),
        }
    }
    sort_siblings(&mut roots, |position| items[position].order);
    for group in &mut children {
        sort_siblings(group, |position| items[position].order);
    }

    let mut nodes: Vec<TreeNode> = items
        .iter()
        .zip(links.parents)
        .zip(children)
        .map(|((item, parent), children)| TreeNode {
            item: item.clone(),
            depth: 0,
            wbs_code: WbsCode::root(0),
            parent,
            children,
        })
        .collect();

    let mut stack: Vec<(NodeIndex, usize, WbsCode)> = roots
        .iter()
        .enumerate()
        .rev()
        .map(|(position, &root)| (root, 0, WbsCode::root(position)))
        .collect();
    while let Some((node, depth, code)) = stack.pop() {
        for (position, &child) in nodes[node].children.iter().enumerate().rev() {
            stack.push((child, depth + 1, code.child(position)));
        }
        nodes[node].depth = depth;
        nodes[node].wbs_code = code;
    }

    tracing::debug!(
        items = nodes.len(),
        roots = roots.len(),
        issues = diagnostics.len(),
        "forest built"
    );

    (
        Forest {
            nodes,
            roots,
            index,
        },
        diagnostics,
    )
}

impl Forest {
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn position(&self, id: ItemId) -> Option<NodeIndex> {
        self.index.get(&id).copied()
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&TreeNode> {
        self.position(id).map(|position| &self.nodes[position])
    }

    /// The sibling group `node` belongs to, in display order.
    #[must_use]
    pub fn siblings(&self, node: NodeIndex) -> &[NodeIndex] {
        self.group(self.nodes[node].parent)
    }

    /// Children of `parent`, or the roots for `None`.
    #[must_use]
    pub fn group(&self, parent: Option<NodeIndex>) -> &[NodeIndex] {
        match parent {
            Some(parent) => &self.nodes[parent].children,
            None => &self.roots,
        }
    }

    /// `true` when `ancestor` is `node` itself or lies on its parent chain.
    #[must_use]
    pub fn is_within(&self, node: NodeIndex, ancestor: NodeIndex) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes[current].parent;
        }
        false
    }

    /// `node` and all of its descendants, pre-order.
    #[must_use]
    pub fn subtree(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }
        out
    }

    pub(crate) fn into_parts(self) -> (Vec<TreeNode>, Vec<NodeIndex>, HashMap<ItemId, NodeIndex>) {
        (self.nodes, self.roots, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_parents_demotes_first_member_of_a_cycle() {
        let keys = ["a", "b", "c"];
        let parents = [Some("c"), Some("a"), Some("b")];
        let links = resolve_parents(&keys, &parents, |_| true);
        assert_eq!(links.parents, vec![None, Some(0), Some(1)]);
        assert_eq!(links.issues, vec![(0, LinkIssue::Cycle)]);
    }

    #[test]
    fn resolve_parents_breaks_self_reference() {
        let keys = ["a"];
        let parents = [Some("a")];
        let links = resolve_parents(&keys, &parents, |_| true);
        assert_eq!(links.parents, vec![None]);
        assert_eq!(links.issues, vec![(0, LinkIssue::Cycle)]);
    }

    #[test]
    fn resolve_parents_reports_duplicates_and_dangling() {
        let keys = ["a", "a", "b"];
        let parents = [None, Some("a"), Some("z")];
        let links = resolve_parents(&keys, &parents, |_| true);
        assert_eq!(links.parents, vec![None, Some(0), None]);
        assert!(links.issues.contains(&(1, LinkIssue::Duplicate)));
        assert!(links.issues.contains(&(2, LinkIssue::Dangling)));
    }
}
