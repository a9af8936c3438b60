//! Work Breakdown Structure engine.
//!
//! Takes the flat, parent-referenced list of budget line items a project
//! stores and derives everything shown or exported from it: the hierarchy,
//! position codes, item and category figures across the previous, current and
//! contractual stages, and the BDI markup. Structural and field edits return
//! a new list plus the patches to persist; the engine keeps no state between
//! calls and never mutates its input.
//!
//! ```rust
//! use uuid::Uuid;
//! use wbs_engine::{ItemFields, LineItem, Money, Percent, Quantity, WbsEngine};
//!
//! let foundations = Uuid::new_v4();
//! let items = vec![
//!     LineItem::category(foundations, None, 0, "Foundations"),
//!     LineItem::item(
//!         Uuid::new_v4(),
//!         Some(foundations),
//!         0,
//!         "Concrete",
//!         ItemFields::priced("m3", Quantity::new(10_00), Money::new(100_00)),
//!     ),
//! ];
//!
//! let engine = WbsEngine::builder().bdi(Percent::new(20_00)).build();
//! let tree = engine.process(&items);
//! assert_eq!(tree.totals().contract_total, Money::new(1_200_00));
//! ```

pub use aggregate::{
    BalancePolicy, CategoryFigures, Figures, ItemFigures, ProcessedNode, ProcessedTree,
    QuantityRollup, Totals, UnitQuantities, aggregate, category_figures, item_figures,
};
pub use diagnostics::{Diagnostic, Field};
pub use edits::{EditOutcome, ItemEdit, apply_edit};
pub use error::EngineError;
pub use flatten::{FlatRow, Visibility};
pub use import::{ImportPlan, ImportRow, PlannedRow, plan_import};
pub use line_item::{ItemFields, ItemId, ItemKind, LineItem, LineItemBody};
pub use markup::{PriceBasis, PriceEdit, UnitPrices, apply_markup, remove_markup};
pub use money::{Money, Percent, Quantity};
pub use patch::{FieldChange, ItemPatch, diff};
pub use project::{ProjectOverrides, ProjectSummary, Recalculation, recalculate_all};
pub use reorder::{Placement, Restructure, delete_item, indent, insert_item, move_item, outdent};
pub use rounding::RoundingMode;
pub use tree::{Forest, NodeIndex, TreeNode, build_forest};
pub use wbs_code::WbsCode;

mod aggregate;
mod diagnostics;
mod edits;
mod error;
mod flatten;
mod import;
mod line_item;
mod markup;
mod money;
mod patch;
mod project;
mod reorder;
pub mod rounding;
mod tree;
mod wbs_code;

type ResultEngine<T> = Result<T, EngineError>;

/// Engine configuration. Cheap to build; every call is a fresh, pure run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WbsEngine {
    bdi: Percent,
    balance_policy: BalancePolicy,
}

impl WbsEngine {
    /// Return a builder for `WbsEngine`. Help to build the struct.
    pub fn builder() -> WbsEngineBuilder {
        WbsEngineBuilder::default()
    }

    #[must_use]
    pub fn bdi(&self) -> Percent {
        self.bdi
    }

    #[must_use]
    pub fn balance_policy(&self) -> BalancePolicy {
        self.balance_policy
    }

    /// Builds the tree and derives every figure.
    #[must_use]
    pub fn process(&self, items: &[LineItem]) -> ProcessedTree {
        let (forest, diagnostics) = build_forest(items);
        let tree = aggregate(forest, diagnostics, self.bdi, self.balance_policy);
        tracing::debug!(
            items = tree.len(),
            diagnostics = tree.diagnostics().len(),
            bdi = %self.bdi,
            "processed line items"
        );
        tree
    }

    /// Headline totals for `items` with the project overrides applied.
    #[must_use]
    pub fn summary(&self, items: &[LineItem], overrides: &ProjectOverrides) -> ProjectSummary {
        ProjectSummary::new(&self.process(items), overrides)
    }

    /// Applies a field edit to the record `id` of `items`.
    pub fn edit(&self, items: &[LineItem], id: ItemId, edit: ItemEdit) -> ResultEngine<EditOutcome> {
        let item = items
            .iter()
            .find(|item| item.id == id)
            .ok_or_else(|| EngineError::KeyNotFound(id.to_string()))?;
        apply_edit(item, edit, self.bdi)
    }

    /// See [`recalculate_all`].
    #[must_use]
    pub fn recalculate_all(
        &self,
        items: &[LineItem],
        overrides: &ProjectOverrides,
    ) -> Recalculation {
        recalculate_all(items, self.bdi, overrides)
    }
}

/// The builder for `WbsEngine`
#[derive(Default)]
pub struct WbsEngineBuilder {
    bdi: Percent,
    balance_policy: BalancePolicy,
}

impl WbsEngineBuilder {
    /// BDI percentage. Negative rates are treated as zero.
    pub fn bdi(mut self, bdi: Percent) -> WbsEngineBuilder {
        self.bdi = bdi.non_negative();
        self
    }

    /// How over-execution shows in balances.
    pub fn balance_policy(mut self, policy: BalancePolicy) -> WbsEngineBuilder {
        self.balance_policy = policy;
        self
    }

    /// Construct `WbsEngine`
    pub fn build(self) -> WbsEngine {
        WbsEngine {
            bdi: self.bdi,
            balance_policy: self.balance_policy,
        }
    }
}
