//! BDI markup.
//!
//! BDI is the overhead-and-profit percentage applied uniformly to unit costs.
//! [`apply_markup`] and [`remove_markup`] are inverses of each other up to one
//! cent of rounding. Which of the two unit prices is authoritative is carried
//! explicitly by [`PriceBasis`] and never guessed from the stored values.

use serde::{Deserialize, Serialize};

use crate::{
    Money, Percent,
    rounding::{RoundingMode, scale},
};

const ONE: i64 = 100_00;

/// The unit price the user typed most recently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBasis {
    /// `unit_price_with_markup` is derived from `unit_price_ex_markup`.
    #[default]
    ExMarkup,
    /// `unit_price_ex_markup` is derived from `unit_price_with_markup`.
    WithMarkup,
}

/// A unit price edit, tagged with the field the user changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PriceEdit {
    ExMarkup(Money),
    WithMarkup(Money),
}

/// Both unit prices of an item, consistent with one BDI rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnitPrices {
    pub ex_markup: Money,
    pub with_markup: Money,
}

/// `round(price × (1 + bdi / 100), 2)`.
///
/// Negative rates are treated as zero.
#[must_use]
pub fn apply_markup(price_ex_markup: Money, bdi: Percent) -> Money {
    let factor = ONE + bdi.non_negative().hundredths();
    Money::new(scale(
        price_ex_markup.cents(),
        factor,
        ONE,
        RoundingMode::HalfAwayFromZero,
    ))
}

/// `round(price / (1 + bdi / 100), 2)`.
///
/// Negative rates are treated as zero.
#[must_use]
pub fn remove_markup(price_with_markup: Money, bdi: Percent) -> Money {
    let factor = ONE + bdi.non_negative().hundredths();
    Money::new(scale(
        price_with_markup.cents(),
        ONE,
        factor,
        RoundingMode::HalfAwayFromZero,
    ))
}

impl PriceEdit {
    /// The basis that becomes authoritative after this edit.
    #[must_use]
    pub const fn basis(self) -> PriceBasis {
        match self {
            PriceEdit::ExMarkup(_) => PriceBasis::ExMarkup,
            PriceEdit::WithMarkup(_) => PriceBasis::WithMarkup,
        }
    }

    /// Resolves both prices from the edited one.
    #[must_use]
    pub fn resolve(self, bdi: Percent) -> UnitPrices {
        match self {
            PriceEdit::ExMarkup(value) => {
                let ex_markup = value.non_negative();
                UnitPrices {
                    ex_markup,
                    with_markup: apply_markup(ex_markup, bdi),
                }
            }
            PriceEdit::WithMarkup(value) => {
                let with_markup = value.non_negative();
                UnitPrices {
                    ex_markup: remove_markup(with_markup, bdi),
                    with_markup,
                }
            }
        }
    }
}

impl UnitPrices {
    /// Re-derives the non-authoritative price from the stored pair.
    #[must_use]
    pub fn derive(basis: PriceBasis, ex_markup: Money, with_markup: Money, bdi: Percent) -> Self {
        match basis {
            PriceBasis::ExMarkup => PriceEdit::ExMarkup(ex_markup),
            PriceBasis::WithMarkup => PriceEdit::WithMarkup(with_markup),
        }
        .resolve(bdi)
    }
}
