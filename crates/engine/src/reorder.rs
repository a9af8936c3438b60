//! Reorder / reparent engine.
//!
//! Structural edits work on the resolved hierarchy and return a new flat list
//! plus the patches needed to persist it. Only the moved record's `parent_id`
//! and the `order` of the group it lands in are rewritten; descendants follow
//! their parent through `parent_id` and are never touched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    EngineError, Forest, ItemId, ItemPatch, LineItem, NodeIndex, ResultEngine, build_forest,
    patch::diff_lists,
};

/// Where a record goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum Placement {
    /// Immediately before `reference`, under the same parent.
    Before { reference: ItemId },
    /// Immediately after `reference`, under the same parent.
    After { reference: ItemId },
    /// At `index` among the children of `parent` (`None` = roots). An index
    /// past the end appends.
    Into {
        parent: Option<ItemId>,
        index: usize,
    },
}

/// A new flat list and what changed in it.
#[derive(Clone, Debug, Default)]
pub struct Restructure {
    pub items: Vec<LineItem>,
    /// Changed `parent_id`/`order` fields of records that already existed.
    pub patches: Vec<ItemPatch>,
    /// The record added by [`insert_item`].
    pub created: Option<ItemId>,
    /// Records dropped by [`delete_item`], the target first.
    pub removed: Vec<ItemId>,
}

/// Resolved destination: parent position and index in the group once the
/// moved record has been taken out of it.
struct Target {
    parent: Option<NodeIndex>,
    group: Vec<NodeIndex>,
    index: usize,
}

fn locate(forest: &Forest, id: ItemId) -> ResultEngine<NodeIndex> {
    forest
        .position(id)
        .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))
}

fn resolve_target(
    forest: &Forest,
    moved: Option<NodeIndex>,
    placement: Placement,
) -> ResultEngine<Target> {
    let without_moved = |group: &[NodeIndex]| -> Vec<NodeIndex> {
        group
            .iter()
            .copied()
            .filter(|&node| Some(node) != moved)
            .collect()
    };

    let (parent, group, index) = match placement {
        Placement::Before { reference } | Placement::After { reference } => {
            let reference_node = locate(forest, reference)?;
            if Some(reference_node) == moved {
                return Err(EngineError::InvalidMove(format!(
                    "{reference} cannot be placed relative to itself"
                )));
            }
            let parent = forest.nodes()[reference_node].parent;
            let group = without_moved(forest.group(parent));
            let at = group
                .iter()
                .position(|&node| node == reference_node)
                .ok_or_else(|| EngineError::KeyNotFound(reference.to_string()))?;
            let index = match placement {
                Placement::After { .. } => at + 1,
                _ => at,
            };
            (parent, group, index)
        }
        Placement::Into { parent, index } => {
            let parent = match parent {
                None => None,
                Some(parent_id) => {
                    let node = locate(forest, parent_id)?;
                    if !forest.nodes()[node].item.is_category() {
                        return Err(EngineError::InvalidParent(format!(
                            "{parent_id} is not a category"
                        )));
                    }
                    Some(node)
                }
            };
            let group = without_moved(forest.group(parent));
            let index = index.min(group.len());
            (parent, group, index)
        }
    };

    if let (Some(moved), Some(parent)) = (moved, parent)
        && forest.is_within(parent, moved)
    {
        let moved_id = forest.nodes()[moved].item.id;
        let parent_id = forest.nodes()[parent].item.id;
        return Err(EngineError::CycleRejected(format!(
            "{moved_id} cannot move under {parent_id}, which is itself or one of its descendants"
        )));
    }

    Ok(Target {
        parent,
        group,
        index,
    })
}

/// Writes the target group's order sequentially from 0 with `node` inserted.
fn place(next: &mut [LineItem], forest_ids: &[ItemId], node: NodeIndex, target: Target) {
    let Target {
        parent,
        mut group,
        index,
    } = target;
    next[node].parent_id = parent.map(|parent| forest_ids[parent]);
    group.insert(index, node);
    for (order, member) in group.into_iter().enumerate() {
        next[member].order = i64::try_from(order).unwrap_or(i64::MAX);
    }
}

/// Moves an existing record (and implicitly its subtree).
///
/// Fails without touching anything when the id is unknown, the destination
/// is not a category, or the destination lies inside the moved subtree.
pub fn move_item(
    items: &[LineItem],
    moved: ItemId,
    placement: Placement,
) -> ResultEngine<Restructure> {
    let (forest, _) = build_forest(items);
    let node = locate(&forest, moved)?;
    let target = resolve_target(&forest, Some(node), placement)?;

    let ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
    let mut next = items.to_vec();
    place(&mut next, &ids, node, target);

    let patches = diff_lists(items, &next);
    tracing::debug!(%moved, ?placement, patched = patches.len(), "item moved");
    Ok(Restructure {
        items: next,
        patches,
        ..Restructure::default()
    })
}

/// Makes the record the last child of its preceding sibling, which must be a
/// category.
pub fn indent(items: &[LineItem], id: ItemId) -> ResultEngine<Restructure> {
    let (forest, _) = build_forest(items);
    let node = locate(&forest, id)?;
    let siblings = forest.siblings(node);
    let at = siblings
        .iter()
        .position(|&sibling| sibling == node)
        .unwrap_or_default();
    let Some(&previous) = at.checked_sub(1).and_then(|at| siblings.get(at)) else {
        return Err(EngineError::InvalidMove(format!(
            "{id} has no preceding sibling to indent under"
        )));
    };
    let previous = &forest.nodes()[previous].item;
    if !previous.is_category() {
        return Err(EngineError::InvalidMove(format!(
            "{id}: preceding sibling {} is not a category",
            previous.id
        )));
    }
    move_item(
        items,
        id,
        Placement::Into {
            parent: Some(previous.id),
            index: usize::MAX,
        },
    )
}

/// Makes the record the sibling immediately after its parent.
pub fn outdent(items: &[LineItem], id: ItemId) -> ResultEngine<Restructure> {
    let (forest, _) = build_forest(items);
    let node = locate(&forest, id)?;
    let Some(parent) = forest.nodes()[node].parent else {
        return Err(EngineError::InvalidMove(format!("{id} is already a root")));
    };
    move_item(
        items,
        id,
        Placement::After {
            reference: forest.nodes()[parent].item.id,
        },
    )
}

/// Adds a new record at `placement`. Its own `parent_id` and `order` are
/// overwritten by the placement.
pub fn insert_item(
    items: &[LineItem],
    item: LineItem,
    placement: Placement,
) -> ResultEngine<Restructure> {
    let (forest, _) = build_forest(items);
    if forest.position(item.id).is_some() {
        return Err(EngineError::ExistingKey(item.id.to_string()));
    }
    let target = resolve_target(&forest, None, placement)?;

    let created = item.id;
    let mut ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
    ids.push(created);
    let mut next = items.to_vec();
    next.push(item);
    let node = next.len() - 1;
    place(&mut next, &ids, node, target);

    // The new record sits past the end of `items` and is reported as created.
    let patches = diff_lists(items, &next);
    tracing::debug!(%created, ?placement, patched = patches.len(), "item inserted");
    Ok(Restructure {
        items: next,
        patches,
        created: Some(created),
        removed: Vec::new(),
    })
}

/// Removes a record and its whole subtree, then closes the gap in its former
/// sibling group.
pub fn delete_item(items: &[LineItem], id: ItemId) -> ResultEngine<Restructure> {
    let (forest, _) = build_forest(items);
    let node = locate(&forest, id)?;
    let subtree: HashSet<NodeIndex> = forest.subtree(node).into_iter().collect();
    let removed: Vec<ItemId> = forest
        .subtree(node)
        .into_iter()
        .map(|member| items[member].id)
        .collect();

    let mut next = items.to_vec();
    let survivors = forest.siblings(node).iter().filter(|&&sibling| sibling != node);
    for (order, &sibling) in survivors.enumerate() {
        next[sibling].order = i64::try_from(order).unwrap_or(i64::MAX);
    }
    // Diffed before the removal so survivors keep their original positions.
    // Records of the removed subtree are unchanged here and yield no patch.
    let patches = diff_lists(items, &next);
    let next: Vec<LineItem> = next
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !subtree.contains(position))
        .map(|(_, item)| item)
        .collect();

    tracing::debug!(%id, removed = removed.len(), patched = patches.len(), "item deleted");
    Ok(Restructure {
        items: next,
        patches,
        created: None,
        removed,
    })
}
