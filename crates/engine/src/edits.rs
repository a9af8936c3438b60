//! Field edits on a single line item.
//!
//! Edits never fail on out-of-range input: values are clamped to the nearest
//! valid one and the clamp is reported. They only fail when the edit cannot
//! apply at all (a price edit on a category, a total spread over nothing).

use serde::{Deserialize, Serialize};

use crate::{
    Diagnostic, EngineError, Field, ItemFields, ItemId, ItemPatch, LineItem, Money, Percent,
    PriceBasis, PriceEdit, Quantity, ResultEngine, UnitPrices, aggregate::clamp_field,
    markup::remove_markup, patch::diff,
};

/// A user edit, tagged with what was typed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "edit", content = "value", rename_all = "snake_case")]
pub enum ItemEdit {
    UnitPrice(PriceEdit),
    ContractQuantity(Quantity),
    /// Derives the with-markup unit price, rounding toward zero.
    ContractTotal(Money),
    CurrentQuantity(Quantity),
    CurrentPercentage(Percent),
    /// Derives the current quantity, rounding toward zero.
    CurrentTotal(Money),
    PreviousMeasurement {
        quantity: Quantity,
        total: Money,
    },
    Unit(String),
    Name(String),
}

/// The edited record and what changed.
#[derive(Clone, Debug)]
pub struct EditOutcome {
    pub item: LineItem,
    /// `None` when the edit left every stored field as it was.
    pub patch: Option<ItemPatch>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Applies `edit` to a copy of `item`.
///
/// After any edit `current_quantity` is brought back within
/// `0..=contract_quantity - previous_quantity`.
pub fn apply_edit(item: &LineItem, edit: ItemEdit, bdi: Percent) -> ResultEngine<EditOutcome> {
    let id = item.id;
    let mut edited = item.clone();
    let mut diagnostics = Vec::new();
    tracing::debug!(%id, ?edit, "applying edit");

    match edit {
        ItemEdit::Name(name) => edited.name = name.trim().to_string(),
        edit => {
            let fields = edited
                .fields_mut()
                .ok_or_else(|| EngineError::NotAnItem(id.to_string()))?;
            edit_fields(id, fields, edit, bdi, &mut diagnostics)?;
        }
    }

    Ok(finish(item, edited, diagnostics))
}

fn edit_fields(
    id: ItemId,
    fields: &mut ItemFields,
    edit: ItemEdit,
    bdi: Percent,
    diagnostics: &mut Vec<Diagnostic>,
) -> ResultEngine<()> {
    let non_negative_money = |field, value: Money, diagnostics: &mut Vec<Diagnostic>| {
        clamp_field(id, field, value, Money::ZERO, Money::new(i64::MAX), diagnostics)
    };
    let non_negative_quantity = |field, value: Quantity, diagnostics: &mut Vec<Diagnostic>| {
        clamp_field(id, field, value, Quantity::ZERO, Quantity::new(i64::MAX), diagnostics)
    };

    match edit {
        ItemEdit::UnitPrice(price) => {
            let price = match price {
                PriceEdit::ExMarkup(value) => PriceEdit::ExMarkup(non_negative_money(
                    Field::UnitPriceExMarkup,
                    value,
                    diagnostics,
                )),
                PriceEdit::WithMarkup(value) => PriceEdit::WithMarkup(non_negative_money(
                    Field::UnitPriceWithMarkup,
                    value,
                    diagnostics,
                )),
            };
            let prices = price.resolve(bdi);
            fields.unit_price_ex_markup = prices.ex_markup;
            fields.unit_price_with_markup = prices.with_markup;
            fields.price_basis = price.basis();
        }
        ItemEdit::ContractQuantity(quantity) => {
            fields.contract_quantity =
                non_negative_quantity(Field::ContractQuantity, quantity, diagnostics);
        }
        ItemEdit::ContractTotal(total) => {
            let total = non_negative_money(Field::ContractTotal, total, diagnostics);
            if !fields.contract_quantity.is_positive() {
                return Err(EngineError::InvalidAmount(format!(
                    "item {id}: cannot derive a unit price from a total without a contract quantity"
                )));
            }
            let with_markup = total.per_unit(fields.contract_quantity);
            fields.unit_price_with_markup = with_markup;
            fields.unit_price_ex_markup = remove_markup(with_markup, bdi);
            fields.price_basis = PriceBasis::WithMarkup;
        }
        ItemEdit::CurrentQuantity(quantity) => {
            fields.current_quantity = quantity;
        }
        ItemEdit::CurrentPercentage(percent) => {
            let contract = fields.contract_quantity.non_negative();
            let ceiling = if contract.is_positive() {
                Percent::HUNDRED
                    - Percent::of_quantity(fields.previous_quantity.non_negative(), contract)
            } else {
                Percent::ZERO
            };
            let percent = clamp_field(
                id,
                Field::CurrentPercentage,
                percent,
                Percent::ZERO,
                ceiling,
                diagnostics,
            );
            fields.current_quantity = contract.share(percent);
        }
        ItemEdit::CurrentTotal(total) => {
            let total = non_negative_money(Field::CurrentTotal, total, diagnostics);
            let prices = UnitPrices::derive(
                fields.price_basis,
                fields.unit_price_ex_markup,
                fields.unit_price_with_markup,
                bdi,
            );
            if !prices.with_markup.is_positive() {
                return Err(EngineError::InvalidAmount(format!(
                    "item {id}: cannot derive a quantity from a total without a unit price"
                )));
            }
            fields.current_quantity = total.units_at(prices.with_markup);
        }
        ItemEdit::PreviousMeasurement { quantity, total } => {
            fields.previous_quantity =
                non_negative_quantity(Field::PreviousQuantity, quantity, diagnostics);
            fields.previous_total = non_negative_money(Field::PreviousTotal, total, diagnostics);
        }
        ItemEdit::Unit(unit) => {
            fields.unit = unit.trim().to_string();
        }
        // Names live on the record, not on the item fields.
        ItemEdit::Name(_) => {}
    }

    let remaining = fields.remaining_quantity();
    fields.current_quantity = clamp_field(
        id,
        Field::CurrentQuantity,
        fields.current_quantity,
        Quantity::ZERO,
        remaining,
        diagnostics,
    );
    Ok(())
}

fn finish(before: &LineItem, after: LineItem, diagnostics: Vec<Diagnostic>) -> EditOutcome {
    for diagnostic in &diagnostics {
        diagnostic.log();
    }
    EditOutcome {
        patch: diff(before, &after),
        item: after,
        diagnostics,
    }
}
