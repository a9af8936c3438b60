//! Field-level change sets handed to the persistence layer.
//!
//! The engine never writes anything itself. Every mutating operation returns
//! the records whose **stored** fields changed, and only those fields.

use serde::Serialize;

use crate::{ItemFields, ItemId, LineItem, LineItemBody, Money, PriceBasis, Quantity};

/// A changed stored field with its new value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldChange {
    ParentId(Option<ItemId>),
    Order(i64),
    Name(String),
    Unit(String),
    ContractQuantity(Quantity),
    UnitPriceExMarkup(Money),
    UnitPriceWithMarkup(Money),
    PriceBasis(PriceBasis),
    PreviousQuantity(Quantity),
    PreviousTotal(Money),
    CurrentQuantity(Quantity),
    /// The record switched between category and item.
    Body(LineItemBody),
}

/// `{id, changed-fields}` for one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemPatch {
    pub id: ItemId,
    pub changes: Vec<FieldChange>,
}

impl ItemPatch {
    /// `true` when any change satisfies `matcher`.
    #[must_use]
    pub fn touches(&self, matcher: impl Fn(&FieldChange) -> bool) -> bool {
        self.changes.iter().any(matcher)
    }
}

/// Compares two versions of the same record.
///
/// Returns `None` when no stored field differs.
#[must_use]
pub fn diff(before: &LineItem, after: &LineItem) -> Option<ItemPatch> {
    let mut changes = Vec::new();
    if before.parent_id != after.parent_id {
        changes.push(FieldChange::ParentId(after.parent_id));
    }
    if before.order != after.order {
        changes.push(FieldChange::Order(after.order));
    }
    if before.name != after.name {
        changes.push(FieldChange::Name(after.name.clone()));
    }
    match (&before.body, &after.body) {
        (LineItemBody::Category, LineItemBody::Category) => {}
        (LineItemBody::Item(old), LineItemBody::Item(new)) => diff_fields(old, new, &mut changes),
        (_, body) => changes.push(FieldChange::Body(body.clone())),
    }

    if changes.is_empty() {
        None
    } else {
        Some(ItemPatch {
            id: after.id,
            changes,
        })
    }
}

fn diff_fields(old: &ItemFields, new: &ItemFields, changes: &mut Vec<FieldChange>) {
    if old.unit != new.unit {
        changes.push(FieldChange::Unit(new.unit.clone()));
    }
    if old.contract_quantity != new.contract_quantity {
        changes.push(FieldChange::ContractQuantity(new.contract_quantity));
    }
    if old.unit_price_ex_markup != new.unit_price_ex_markup {
        changes.push(FieldChange::UnitPriceExMarkup(new.unit_price_ex_markup));
    }
    if old.unit_price_with_markup != new.unit_price_with_markup {
        changes.push(FieldChange::UnitPriceWithMarkup(new.unit_price_with_markup));
    }
    if old.price_basis != new.price_basis {
        changes.push(FieldChange::PriceBasis(new.price_basis));
    }
    if old.previous_quantity != new.previous_quantity {
        changes.push(FieldChange::PreviousQuantity(new.previous_quantity));
    }
    if old.previous_total != new.previous_total {
        changes.push(FieldChange::PreviousTotal(new.previous_total));
    }
    if old.current_quantity != new.current_quantity {
        changes.push(FieldChange::CurrentQuantity(new.current_quantity));
    }
}

/// Patches for every record of `after` that differs from the record at the
/// same position in `before`. Ids may repeat, so records are paired by
/// position, never by id. Positions past the end of either slice are skipped.
pub(crate) fn diff_lists(before: &[LineItem], after: &[LineItem]) -> Vec<ItemPatch> {
    before
        .iter()
        .zip(after)
        .filter_map(|(old, new)| diff(old, new))
        .collect()
}
