//! Project-level totals, manual overrides and the "recalculate all" action.

use serde::{Deserialize, Serialize};

use crate::{
    ItemPatch, LineItem, Money, Percent, PriceBasis, PriceEdit, ProcessedTree, Totals,
    patch::diff_lists,
};

/// Manual patches over the computed grand totals.
///
/// They never touch a line item and are discarded by [`recalculate_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectOverrides {
    pub contract_total_override: Option<Money>,
    pub current_total_override: Option<Money>,
}

impl ProjectOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contract_total_override.is_none() && self.current_total_override.is_none()
    }
}

/// What summaries show: computed totals and the effective, possibly overridden,
/// headline figures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub computed: Totals,
    pub contract_total: Money,
    pub current_total: Money,
    pub contract_total_overridden: bool,
    pub current_total_overridden: bool,
    /// Effective current total over effective contract total.
    pub current_percentage: Percent,
}

impl ProjectSummary {
    #[must_use]
    pub fn new(tree: &ProcessedTree, overrides: &ProjectOverrides) -> Self {
        let computed = *tree.totals();
        let contract_total = overrides
            .contract_total_override
            .unwrap_or(computed.contract_total);
        let current_total = overrides
            .current_total_override
            .unwrap_or(computed.current_total);
        Self {
            computed,
            contract_total,
            current_total,
            contract_total_overridden: overrides.contract_total_override.is_some(),
            current_total_overridden: overrides.current_total_override.is_some(),
            current_percentage: Percent::of_money(current_total, contract_total),
        }
    }
}

/// Result of [`recalculate_all`].
#[derive(Clone, Debug)]
pub struct Recalculation {
    pub items: Vec<LineItem>,
    pub patches: Vec<ItemPatch>,
    /// Always empty: overrides belong to the baseline that was just replaced.
    pub overrides: ProjectOverrides,
    pub discarded_overrides: ProjectOverrides,
}

/// Re-derives every with-markup unit price from the stored ex-markup price and
/// `bdi`, overwriting manual with-markup edits, and clears the overrides.
///
/// This is the explicit, user-confirmed reset; nothing calls it implicitly.
#[must_use]
pub fn recalculate_all(
    items: &[LineItem],
    bdi: Percent,
    overrides: &ProjectOverrides,
) -> Recalculation {
    let recalculated: Vec<LineItem> = items
        .iter()
        .cloned()
        .map(|mut item| {
            if let Some(fields) = item.fields_mut() {
                let prices = PriceEdit::ExMarkup(fields.unit_price_ex_markup).resolve(bdi);
                fields.unit_price_ex_markup = prices.ex_markup;
                fields.unit_price_with_markup = prices.with_markup;
                fields.price_basis = PriceBasis::ExMarkup;
            }
            item
        })
        .collect();
    let patches = diff_lists(items, &recalculated);
    tracing::debug!(
        items = items.len(),
        patched = patches.len(),
        cleared_overrides = !overrides.is_empty(),
        "recalculated all prices"
    );

    Recalculation {
        items: recalculated,
        patches,
        overrides: ProjectOverrides::default(),
        discarded_overrides: *overrides,
    }
}
