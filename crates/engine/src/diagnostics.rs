//! Corrections the engine applied silently while reading or mutating a list.

use std::fmt;

use serde::Serialize;

use crate::ItemId;

/// Which numeric field a clamp touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ContractQuantity,
    ContractTotal,
    UnitPriceExMarkup,
    UnitPriceWithMarkup,
    PreviousQuantity,
    PreviousTotal,
    CurrentQuantity,
    CurrentPercentage,
    CurrentTotal,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContractQuantity => "contract_quantity",
            Self::ContractTotal => "contract_total",
            Self::UnitPriceExMarkup => "unit_price_ex_markup",
            Self::UnitPriceWithMarkup => "unit_price_with_markup",
            Self::PreviousQuantity => "previous_quantity",
            Self::PreviousTotal => "previous_total",
            Self::CurrentQuantity => "current_quantity",
            Self::CurrentPercentage => "current_percentage",
            Self::CurrentTotal => "current_total",
        }
    }
}

/// A local correction. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "diagnostic", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The parent does not exist; the item was demoted to root.
    DanglingParent { id: ItemId, parent_id: ItemId },
    /// The parent is a priced item; the item was demoted to root.
    ParentNotCategory { id: ItemId, parent_id: ItemId },
    /// The item's parent chain led back to itself; it was demoted to root.
    CycleBroken { id: ItemId },
    /// The id appears more than once. The first record owns it.
    DuplicateId { id: ItemId },
    /// A value outside its domain was replaced by the nearest valid one.
    Clamped {
        id: ItemId,
        field: Field,
        requested: String,
        applied: String,
    },
    /// An import row carried a malformed position code.
    InvalidCode { row: usize, code: String },
    /// Two import rows carried the same position code.
    DuplicateCode { row: usize, code: String },
    /// An import row's parent code matched no row; it was demoted to root.
    MissingParentCode { row: usize, code: String },
    /// An import row's parent code matched a priced item; it was demoted to root.
    ParentCodeNotCategory { row: usize, code: String },
}

impl Diagnostic {
    pub(crate) fn clamped(
        id: ItemId,
        field: Field,
        requested: impl fmt::Display,
        applied: impl fmt::Display,
    ) -> Self {
        Self::Clamped {
            id,
            field,
            requested: requested.to_string(),
            applied: applied.to_string(),
        }
    }

    /// Emits the diagnostic as a `warn` event.
    pub(crate) fn log(&self) {
        tracing::warn!("{self}");
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingParent { id, parent_id } => {
                write!(f, "item {id}: parent {parent_id} not found, moved to root")
            }
            Self::ParentNotCategory { id, parent_id } => {
                write!(f, "item {id}: parent {parent_id} is not a category, moved to root")
            }
            Self::CycleBroken { id } => {
                write!(f, "item {id}: parent chain loops back to itself, moved to root")
            }
            Self::DuplicateId { id } => write!(f, "item {id}: duplicated id"),
            Self::Clamped {
                id,
                field,
                requested,
                applied,
            } => write!(
                f,
                "item {id}: {} {requested} out of range, using {applied}",
                field.as_str()
            ),
            Self::InvalidCode { row, code } => write!(f, "row {row}: invalid code \"{code}\""),
            Self::DuplicateCode { row, code } => write!(f, "row {row}: duplicated code \"{code}\""),
            Self::MissingParentCode { row, code } => {
                write!(f, "row {row}: no parent row for \"{code}\", moved to root")
            }
            Self::ParentCodeNotCategory { row, code } => {
                write!(f, "row {row}: parent of \"{code}\" is not a category, moved to root")
            }
        }
    }
}
