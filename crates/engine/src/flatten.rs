//! Flattener: the pre-order row sequence grids and exports iterate.

use std::collections::HashSet;

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

use crate::{ItemId, NodeIndex, ProcessedNode, ProcessedTree, WbsCode};

/// Which categories are descended into.
#[derive(Clone, Copy, Debug)]
pub enum Visibility<'a> {
    /// Only categories whose id is in the set show their children.
    Expanded(&'a HashSet<ItemId>),
    /// Every row, regardless of collapse state (export, print).
    All,
}

/// One rendered row.
#[derive(Clone, Copy, Debug)]
pub struct FlatRow<'a> {
    pub node: &'a ProcessedNode,
    pub has_children: bool,
    /// Whether the row's children follow it in the sequence.
    pub expanded: bool,
}

impl ProcessedTree {
    /// Pre-order walk honouring `visibility`.
    #[must_use]
    pub fn flatten(&self, visibility: Visibility<'_>) -> Vec<FlatRow<'_>> {
        let descend = |node: &ProcessedNode| match visibility {
            Visibility::All => true,
            Visibility::Expanded(expanded) => expanded.contains(&node.id()),
        };
        self.walk(descend, |_| true)
    }

    /// Rows whose name or position code matches `query`, plus their ancestors.
    ///
    /// Names match case- and accent-insensitively by substring. A query that
    /// parses as a position code also matches that code and everything under
    /// it. An empty query returns every row.
    #[must_use]
    pub fn filter(&self, query: &str) -> Vec<FlatRow<'_>> {
        let Some(needle) = normalize_text(query) else {
            return self.flatten(Visibility::All);
        };
        let code = query.trim().parse::<WbsCode>().ok();

        let mut included: HashSet<NodeIndex> = HashSet::new();
        for (index, node) in self.nodes().iter().enumerate() {
            let by_name =
                normalize_text(&node.item.name).is_some_and(|name| name.contains(&needle));
            let by_code = code
                .as_ref()
                .is_some_and(|code| node.wbs_code.starts_with(code));
            if by_name || by_code {
                included.insert(index);
                included.extend(self.ancestors(index));
            }
        }

        self.walk(|_| true, |index| included.contains(&index))
    }

    fn walk(
        &self,
        descend: impl Fn(&ProcessedNode) -> bool,
        keep: impl Fn(NodeIndex) -> bool,
    ) -> Vec<FlatRow<'_>> {
        let mut rows = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeIndex> = self.roots().iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            if !keep(index) {
                continue;
            }
            let node = self.node(index);
            let has_children = !node.children.is_empty();
            let expanded =
                descend(node) && node.children.iter().any(|&child| keep(child));
            rows.push(FlatRow {
                node,
                has_children,
                expanded,
            });
            if expanded {
                stack.extend(node.children.iter().rev());
            }
        }
        rows
    }
}

/// Lowercase, accent-free, single-spaced form used for matching.
pub(crate) fn normalize_text(input: &str) -> Option<String> {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() || ch == '.' {
            out.extend(ch.to_lowercase());
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    let normalized = out.trim_end();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}
