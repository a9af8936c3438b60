//! Hierarchy reconstruction for imported rows.
//!
//! Spreadsheet rows carry a human-entered position code instead of an id. The
//! parent of `1.2.3` is the row coded `1.2`, resolved through the same routine
//! the tree builder uses for stored ids, with the same demote-to-root rules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Diagnostic, ItemId, LineItem, LineItemBody, WbsCode,
    tree::{LinkIssue, resolve_parents, sort_siblings},
};

/// A candidate line item keyed by its position code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRow {
    pub code: String,
    pub name: String,
    #[serde(flatten)]
    pub body: LineItemBody,
}

/// A row with its resolved place in the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedRow {
    /// `None` when the code could not be parsed.
    pub code: Option<WbsCode>,
    /// Position of the parent row in [`ImportPlan::rows`].
    pub parent: Option<usize>,
    pub order: i64,
    pub name: String,
    pub body: LineItemBody,
}

#[derive(Clone, Debug, Default)]
pub struct ImportPlan {
    pub rows: Vec<PlannedRow>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(PartialEq, Eq, Hash)]
enum RowKey {
    Code(WbsCode),
    Unparsed(usize),
}

/// Resolves parents by code prefix and derives sibling order from the last
/// code segment, ties broken by row sequence. Every row is kept.
#[must_use]
pub fn plan_import(rows: Vec<ImportRow>) -> ImportPlan {
    let mut diagnostics = Vec::new();
    let codes: Vec<Option<WbsCode>> = rows
        .iter()
        .enumerate()
        .map(|(row, import)| match import.code.parse::<WbsCode>() {
            Ok(code) => Some(code),
            Err(_) => {
                diagnostics.push(Diagnostic::InvalidCode {
                    row,
                    code: import.code.clone(),
                });
                None
            }
        })
        .collect();

    let keys: Vec<RowKey> = codes
        .iter()
        .enumerate()
        .map(|(row, code)| match code {
            Some(code) => RowKey::Code(code.clone()),
            None => RowKey::Unparsed(row),
        })
        .collect();
    let parent_keys: Vec<Option<RowKey>> = codes
        .iter()
        .map(|code| code.as_ref().and_then(WbsCode::parent).map(RowKey::Code))
        .collect();
    let links = resolve_parents(&keys, &parent_keys, |row| {
        matches!(rows[row].body, LineItemBody::Category)
    });

    for (row, issue) in links.issues {
        let code = rows[row].code.clone();
        diagnostics.push(match issue {
            LinkIssue::Dangling => Diagnostic::MissingParentCode { row, code },
            LinkIssue::NotContainer => Diagnostic::ParentCodeNotCategory { row, code },
            LinkIssue::Duplicate => Diagnostic::DuplicateCode { row, code },
            // Parent codes are strictly shorter, so prefixes cannot loop.
            LinkIssue::Cycle => Diagnostic::InvalidCode { row, code },
        });
    }
    for diagnostic in &diagnostics {
        diagnostic.log();
    }

    let mut groups: std::collections::HashMap<Option<usize>, Vec<usize>> =
        std::collections::HashMap::new();
    for (row, parent) in links.parents.iter().enumerate() {
        groups.entry(*parent).or_default().push(row);
    }
    let mut orders = vec![0_i64; rows.len()];
    for group in groups.values_mut() {
        sort_siblings(group, |row| codes[row].as_ref().map_or(u32::MAX, WbsCode::last));
        for (order, &row) in group.iter().enumerate() {
            orders[row] = i64::try_from(order).unwrap_or(i64::MAX);
        }
    }

    let rows = rows
        .into_iter()
        .zip(codes)
        .zip(links.parents)
        .zip(orders)
        .map(|(((row, code), parent), order)| PlannedRow {
            code,
            parent,
            order,
            name: row.name.trim().to_string(),
            body: row.body,
        })
        .collect();

    ImportPlan { rows, diagnostics }
}

impl ImportPlan {
    /// Materialises the rows as line items with ids from `next_id`.
    pub fn into_line_items(self, mut next_id: impl FnMut() -> ItemId) -> Vec<LineItem> {
        let ids: Vec<ItemId> = self.rows.iter().map(|_| next_id()).collect();
        self.rows
            .into_iter()
            .zip(&ids)
            .map(|(row, &id)| LineItem {
                id,
                parent_id: row.parent.map(|parent| ids[parent]),
                order: row.order,
                name: row.name,
                body: row.body,
            })
            .collect()
    }

    /// Same as [`ImportPlan::into_line_items`] with random v4 ids.
    pub fn into_line_items_v4(self) -> Vec<LineItem> {
        self.into_line_items(Uuid::new_v4)
    }
}
