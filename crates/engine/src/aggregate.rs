//! Recursive aggregator.
//!
//! Item figures are derived from stored fields and the project BDI. Category
//! figures are the sums of their children's already rounded figures, so a
//! category total always equals the sum of the totals shown under it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    Diagnostic, Field, Forest, ItemFields, ItemId, LineItem, LineItemBody, Money, NodeIndex,
    Percent, PriceBasis, Quantity, UnitPrices, WbsCode,
};

/// What happens to the balance when more was measured than contracted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Balances never go below zero.
    #[default]
    ClampAtZero,
    /// Negative balances are kept as an overrun signal.
    AllowOverrun,
}

impl BalancePolicy {
    /// The single switch for over-execution handling.
    #[must_use]
    pub const fn allows_overrun(self) -> bool {
        matches!(self, BalancePolicy::AllowOverrun)
    }

    /// Applies the policy to a raw `contracted - accumulated` value.
    #[must_use]
    pub fn settle<T: Ord + Default>(self, raw: T) -> T {
        if self.allows_overrun() {
            raw
        } else {
            raw.max(T::default())
        }
    }
}

/// The monetary fields every node carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub contract_total: Money,
    pub previous_total: Money,
    pub current_total: Money,
    pub accumulated_total: Money,
    pub balance_total: Money,
}

impl std::ops::AddAssign for Totals {
    fn add_assign(&mut self, rhs: Totals) {
        self.contract_total += rhs.contract_total;
        self.previous_total += rhs.previous_total;
        self.current_total += rhs.current_total;
        self.accumulated_total += rhs.accumulated_total;
        self.balance_total += rhs.balance_total;
    }
}

/// Derived figures of a priced item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemFigures {
    pub unit_price_ex_markup: Money,
    pub unit_price_with_markup: Money,
    pub quantities: UnitQuantities,
    pub previous_percentage: Percent,
    pub current_percentage: Percent,
    pub accumulated_percentage: Percent,
    #[serde(flatten)]
    pub totals: Totals,
}

/// Quantity fields in one unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnitQuantities {
    pub unit: String,
    pub contract_quantity: Quantity,
    pub previous_quantity: Quantity,
    pub current_quantity: Quantity,
    pub accumulated_quantity: Quantity,
    pub balance_quantity: Quantity,
}

/// Quantity rollup of a category.
///
/// Only [`QuantityRollup::Uniform`] carries numbers; the other two states
/// tell an empty category apart from one whose items use different units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum QuantityRollup {
    NoItems,
    Uniform(UnitQuantities),
    MixedUnits,
}

/// Derived figures of a category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryFigures {
    #[serde(flatten)]
    pub totals: Totals,
    pub quantities: QuantityRollup,
    /// Current total over contract total.
    pub current_percentage: Percent,
    /// Accumulated total over contract total.
    pub accumulated_percentage: Percent,
    /// Priced items anywhere below the category.
    pub item_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Figures {
    Category(CategoryFigures),
    Item(ItemFigures),
}

impl Figures {
    #[must_use]
    pub fn totals(&self) -> &Totals {
        match self {
            Figures::Category(figures) => &figures.totals,
            Figures::Item(figures) => &figures.totals,
        }
    }

    /// Quantities when they can be summed meaningfully.
    #[must_use]
    pub fn quantities(&self) -> Option<&UnitQuantities> {
        match self {
            Figures::Item(figures) => Some(&figures.quantities),
            Figures::Category(CategoryFigures {
                quantities: QuantityRollup::Uniform(quantities),
                ..
            }) => Some(quantities),
            Figures::Category(_) => None,
        }
    }
}

/// A line item with its place in the tree and its derived figures.
#[derive(Clone, Debug)]
pub struct ProcessedNode {
    pub item: LineItem,
    pub depth: usize,
    pub wbs_code: WbsCode,
    pub parent: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub figures: Figures,
}

impl ProcessedNode {
    #[must_use]
    pub fn id(&self) -> ItemId {
        self.item.id
    }

    #[must_use]
    pub fn totals(&self) -> &Totals {
        self.figures.totals()
    }
}

/// Output of one engine run: the aggregated forest plus every correction made
/// while building it.
#[derive(Clone, Debug, Default)]
pub struct ProcessedTree {
    nodes: Vec<ProcessedNode>,
    roots: Vec<NodeIndex>,
    index: HashMap<ItemId, NodeIndex>,
    diagnostics: Vec<Diagnostic>,
    totals: Totals,
}

impl ProcessedTree {
    #[must_use]
    pub fn nodes(&self) -> &[ProcessedNode] {
        &self.nodes
    }

    #[must_use]
    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &ProcessedNode {
        &self.nodes[index]
    }

    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&ProcessedNode> {
        self.index.get(&id).map(|&index| &self.nodes[index])
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Grand totals, the sum over the roots.
    #[must_use]
    pub fn totals(&self) -> &Totals {
        &self.totals
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent chain of `index`, nearest first.
    pub fn ancestors(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.nodes[index].parent, |&current| {
            self.nodes[current].parent
        })
    }
}

/// Derives all figures for `forest`.
///
/// `diagnostics` are the ones produced while building the forest; clamps found
/// here are appended to them.
pub fn aggregate(
    forest: Forest,
    mut diagnostics: Vec<Diagnostic>,
    bdi: Percent,
    policy: BalancePolicy,
) -> ProcessedTree {
    let (tree_nodes, roots, index) = forest.into_parts();

    let mut pre_order = Vec::with_capacity(tree_nodes.len());
    let mut stack: Vec<NodeIndex> = roots.iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        pre_order.push(node);
        stack.extend(tree_nodes[node].children.iter().rev());
    }

    // Reverse pre-order visits every child before its parent.
    let mut figures: Vec<Option<Figures>> = vec![None; tree_nodes.len()];
    for &node in pre_order.iter().rev() {
        let tree_node = &tree_nodes[node];
        let computed = match &tree_node.item.body {
            LineItemBody::Item(fields) => Figures::Item(item_figures(
                tree_node.item.id,
                fields,
                bdi,
                policy,
                &mut diagnostics,
            )),
            LineItemBody::Category => Figures::Category(category_figures(
                tree_node
                    .children
                    .iter()
                    .filter_map(|&child| figures[child].as_ref()),
            )),
        };
        figures[node] = Some(computed);
    }

    let mut totals = Totals::default();
    for &root in &roots {
        if let Some(root_figures) = &figures[root] {
            totals += *root_figures.totals();
        }
    }

    let nodes = tree_nodes
        .into_iter()
        .zip(figures)
        .map(|(node, figures)| ProcessedNode {
            figures: figures.unwrap_or_else(|| empty_figures(&node.item)),
            item: node.item,
            depth: node.depth,
            wbs_code: node.wbs_code,
            parent: node.parent,
            children: node.children,
        })
        .collect();

    ProcessedTree {
        nodes,
        roots,
        index,
        diagnostics,
        totals,
    }
}

// Every node is reachable from a root, so this only guards the type.
fn empty_figures(item: &LineItem) -> Figures {
    match item.body {
        LineItemBody::Category => Figures::Category(category_figures(std::iter::empty())),
        LineItemBody::Item(_) => Figures::Item(ItemFigures {
            unit_price_ex_markup: Money::ZERO,
            unit_price_with_markup: Money::ZERO,
            quantities: UnitQuantities::zero(""),
            previous_percentage: Percent::ZERO,
            current_percentage: Percent::ZERO,
            accumulated_percentage: Percent::ZERO,
            totals: Totals::default(),
        }),
    }
}

/// Replaces an out-of-range value by the nearest bound and records it.
pub(crate) fn clamp_field<T: Ord + Copy + std::fmt::Display>(
    id: ItemId,
    field: Field,
    value: T,
    low: T,
    high: T,
    diagnostics: &mut Vec<Diagnostic>,
) -> T {
    let applied = value.max(low).min(high.max(low));
    if applied != value {
        diagnostics.push(Diagnostic::clamped(id, field, value, applied));
    }
    applied
}

/// Derives the figures of one priced item.
///
/// Out-of-domain stored values are clamped for the computation only.
pub fn item_figures(
    id: ItemId,
    fields: &ItemFields,
    bdi: Percent,
    policy: BalancePolicy,
    diagnostics: &mut Vec<Diagnostic>,
) -> ItemFigures {
    let first_new = diagnostics.len();
    let max = Quantity::new(i64::MAX);
    let max_money = Money::new(i64::MAX);

    let contract_quantity = clamp_field(
        id,
        Field::ContractQuantity,
        fields.contract_quantity,
        Quantity::ZERO,
        max,
        diagnostics,
    );
    let (edited_field, edited_price) = match fields.price_basis {
        PriceBasis::ExMarkup => (Field::UnitPriceExMarkup, fields.unit_price_ex_markup),
        PriceBasis::WithMarkup => {
            (Field::UnitPriceWithMarkup, fields.unit_price_with_markup)
        }
    };
    let edited_price =
        clamp_field(id, edited_field, edited_price, Money::ZERO, max_money, diagnostics);
    let (ex_markup, with_markup) = match fields.price_basis {
        PriceBasis::ExMarkup => (edited_price, fields.unit_price_with_markup),
        PriceBasis::WithMarkup => (fields.unit_price_ex_markup, edited_price),
    };
    let prices = UnitPrices::derive(fields.price_basis, ex_markup, with_markup, bdi);

    let previous_quantity = clamp_field(
        id,
        Field::PreviousQuantity,
        fields.previous_quantity,
        Quantity::ZERO,
        max,
        diagnostics,
    );
    let previous_total = clamp_field(
        id,
        Field::PreviousTotal,
        fields.previous_total,
        Money::ZERO,
        max_money,
        diagnostics,
    );
    let remaining = (contract_quantity - previous_quantity).non_negative();
    let current_quantity = clamp_field(
        id,
        Field::CurrentQuantity,
        fields.current_quantity,
        Quantity::ZERO,
        remaining,
        diagnostics,
    );

    for diagnostic in &diagnostics[first_new..] {
        diagnostic.log();
    }

    let contract_total = contract_quantity.times(prices.with_markup);
    let current_total = current_quantity.times(prices.with_markup);
    let accumulated_quantity = previous_quantity + current_quantity;
    let accumulated_total = previous_total + current_total;

    ItemFigures {
        unit_price_ex_markup: prices.ex_markup,
        unit_price_with_markup: prices.with_markup,
        quantities: UnitQuantities {
            unit: fields.unit.trim().to_string(),
            contract_quantity,
            previous_quantity,
            current_quantity,
            accumulated_quantity,
            balance_quantity: policy.settle(contract_quantity - accumulated_quantity),
        },
        previous_percentage: Percent::of_quantity(previous_quantity, contract_quantity),
        current_percentage: Percent::of_quantity(current_quantity, contract_quantity),
        accumulated_percentage: Percent::of_quantity(accumulated_quantity, contract_quantity),
        totals: Totals {
            contract_total,
            previous_total,
            current_total,
            accumulated_total,
            balance_total: policy.settle(contract_total - accumulated_total),
        },
    }
}

/// Sums the figures of a category's direct children.
pub fn category_figures<'a>(children: impl Iterator<Item = &'a Figures>) -> CategoryFigures {
    let mut totals = Totals::default();
    let mut quantities = QuantityRollup::NoItems;
    let mut item_count = 0;

    for child in children {
        totals += *child.totals();
        let child_quantities = match child {
            Figures::Item(figures) => {
                item_count += 1;
                QuantityRollup::Uniform(figures.quantities.clone())
            }
            Figures::Category(figures) => {
                item_count += figures.item_count;
                figures.quantities.clone()
            }
        };
        quantities = quantities.merge(child_quantities);
    }

    CategoryFigures {
        current_percentage: Percent::of_money(totals.current_total, totals.contract_total),
        accumulated_percentage: Percent::of_money(
            totals.accumulated_total,
            totals.contract_total,
        ),
        totals,
        quantities,
        item_count,
    }
}

impl UnitQuantities {
    fn zero(unit: &str) -> Self {
        Self {
            unit: unit.to_string(),
            contract_quantity: Quantity::ZERO,
            previous_quantity: Quantity::ZERO,
            current_quantity: Quantity::ZERO,
            accumulated_quantity: Quantity::ZERO,
            balance_quantity: Quantity::ZERO,
        }
    }
}

impl QuantityRollup {
    fn merge(self, other: QuantityRollup) -> QuantityRollup {
        match (self, other) {
            (QuantityRollup::NoItems, other) | (other, QuantityRollup::NoItems) => other,
            (QuantityRollup::MixedUnits, _) | (_, QuantityRollup::MixedUnits) => {
                QuantityRollup::MixedUnits
            }
            (QuantityRollup::Uniform(mut left), QuantityRollup::Uniform(right)) => {
                if left.unit != right.unit {
                    return QuantityRollup::MixedUnits;
                }
                left.contract_quantity += right.contract_quantity;
                left.previous_quantity += right.previous_quantity;
                left.current_quantity += right.current_quantity;
                left.accumulated_quantity += right.accumulated_quantity;
                left.balance_quantity += right.balance_quantity;
                QuantityRollup::Uniform(left)
            }
        }
    }

    /// The summed quantities, if the category has items in a single unit.
    #[must_use]
    pub fn uniform(&self) -> Option<&UnitQuantities> {
        match self {
            QuantityRollup::Uniform(quantities) => Some(quantities),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn settle_follows_policy() {
        assert_eq!(BalancePolicy::ClampAtZero.settle(Money::new(-5)), Money::ZERO);
        assert_eq!(BalancePolicy::AllowOverrun.settle(Money::new(-5)), Money::new(-5));
        assert_eq!(BalancePolicy::ClampAtZero.settle(Quantity::new(7)), Quantity::new(7));
    }

    #[test]
    fn item_with_zero_contract_has_zero_percentages() {
        let mut diagnostics = Vec::new();
        let fields = ItemFields::priced("m", Quantity::ZERO, Money::new(10_00))
            .with_current(Quantity::new(5_00));
        let figures = item_figures(
            Uuid::nil(),
            &fields,
            Percent::ZERO,
            BalancePolicy::ClampAtZero,
            &mut diagnostics,
        );
        assert_eq!(figures.current_percentage, Percent::ZERO);
        assert_eq!(figures.quantities.current_quantity, Quantity::ZERO);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn negative_edited_price_is_clamped_before_deriving() {
        let mut diagnostics = Vec::new();
        let mut fields = ItemFields::priced("m", Quantity::new(2_00), Money::new(50_00));
        fields.price_basis = PriceBasis::WithMarkup;
        fields.unit_price_with_markup = Money::new(-11_00);
        let figures = item_figures(
            Uuid::nil(),
            &fields,
            Percent::new(10_00),
            BalancePolicy::ClampAtZero,
            &mut diagnostics,
        );
        assert_eq!(figures.unit_price_with_markup, Money::ZERO);
        assert_eq!(figures.unit_price_ex_markup, Money::ZERO);
        assert_eq!(figures.totals.contract_total, Money::ZERO);
        assert!(matches!(
            diagnostics.as_slice(),
            [Diagnostic::Clamped {
                field: Field::UnitPriceWithMarkup,
                ..
            }]
        ));
    }

    #[test]
    fn merge_detects_mixed_units() {
        let m = QuantityRollup::Uniform(UnitQuantities::zero("m"));
        let kg = QuantityRollup::Uniform(UnitQuantities::zero("kg"));
        assert_eq!(m.clone().merge(QuantityRollup::NoItems), m);
        assert_eq!(m.merge(kg), QuantityRollup::MixedUnits);
    }
}
