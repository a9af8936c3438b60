//! The flat budget record the engine reads and patches.
//!
//! A [`LineItem`] is either a category (a pure aggregation node) or a priced
//! item. Only stored fields live here; totals, percentages and balances are
//! derived on every read by the aggregator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Money, PriceBasis, Quantity};

/// Stable identifier of a [`LineItem`].
pub type ItemId = Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Category,
    Item,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Item => "item",
        }
    }
}

/// A budget line: a category or a priced item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: ItemId,
    /// `None` means root.
    #[serde(default)]
    pub parent_id: Option<ItemId>,
    /// Sibling sort key. Gaps are allowed.
    #[serde(default)]
    pub order: i64,
    pub name: String,
    #[serde(flatten)]
    pub body: LineItemBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineItemBody {
    Category,
    Item(ItemFields),
}

/// Stored fields of a priced item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemFields {
    pub unit: String,
    pub contract_quantity: Quantity,
    pub unit_price_ex_markup: Money,
    pub unit_price_with_markup: Money,
    pub price_basis: PriceBasis,
    /// Measured in earlier periods, supplied externally.
    pub previous_quantity: Quantity,
    pub previous_total: Money,
    /// Measured in the active period.
    pub current_quantity: Quantity,
}

impl LineItem {
    pub fn category(id: ItemId, parent_id: Option<ItemId>, order: i64, name: &str) -> Self {
        Self {
            id,
            parent_id,
            order,
            name: name.to_string(),
            body: LineItemBody::Category,
        }
    }

    pub fn item(
        id: ItemId,
        parent_id: Option<ItemId>,
        order: i64,
        name: &str,
        fields: ItemFields,
    ) -> Self {
        Self {
            id,
            parent_id,
            order,
            name: name.to_string(),
            body: LineItemBody::Item(fields),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        match self.body {
            LineItemBody::Category => ItemKind::Category,
            LineItemBody::Item(_) => ItemKind::Item,
        }
    }

    #[must_use]
    pub fn is_category(&self) -> bool {
        matches!(self.body, LineItemBody::Category)
    }

    #[must_use]
    pub fn fields(&self) -> Option<&ItemFields> {
        match &self.body {
            LineItemBody::Item(fields) => Some(fields),
            LineItemBody::Category => None,
        }
    }

    pub fn fields_mut(&mut self) -> Option<&mut ItemFields> {
        match &mut self.body {
            LineItemBody::Item(fields) => Some(fields),
            LineItemBody::Category => None,
        }
    }
}

impl ItemFields {
    /// An item priced ex-markup, the usual way budgets are entered.
    pub fn priced(unit: &str, contract_quantity: Quantity, unit_price_ex_markup: Money) -> Self {
        Self {
            unit: unit.to_string(),
            contract_quantity,
            unit_price_ex_markup,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_previous(mut self, quantity: Quantity, total: Money) -> Self {
        self.previous_quantity = quantity;
        self.previous_total = total;
        self
    }

    #[must_use]
    pub fn with_current(mut self, quantity: Quantity) -> Self {
        self.current_quantity = quantity;
        self
    }

    /// Contracted quantity not yet measured in earlier periods, never negative.
    #[must_use]
    pub fn remaining_quantity(&self) -> Quantity {
        (self.contract_quantity.non_negative() - self.previous_quantity.non_negative())
            .non_negative()
    }
}
