use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;
use wbs_engine::{BalancePolicy, ItemEdit, Money, Percent, Placement, PriceEdit, Quantity};

use crate::error::{AppError, Result};

#[derive(Parser, Debug)]
#[command(name = "wbs")]
#[command(about = "Inspect and edit a budget work breakdown structure stored as JSON")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Project snapshot to read.
    #[arg(long, short, global = true)]
    pub snapshot: Option<PathBuf>,
    /// Override the default BDI percentage.
    #[arg(long, global = true)]
    pub bdi: Option<Percent>,
    #[arg(long, global = true, value_enum)]
    pub balance_policy: Option<PolicyArg>,
    /// Override the log level (e.g. `debug`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    /// Rewrite the snapshot after a mutating command.
    #[arg(long, global = true)]
    pub write: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PolicyArg {
    ClampAtZero,
    AllowOverrun,
}

impl From<PolicyArg> for BalancePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::ClampAtZero => BalancePolicy::ClampAtZero,
            PolicyArg::AllowOverrun => BalancePolicy::AllowOverrun,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the tree with derived figures.
    Tree(TreeArgs),
    /// Print project totals, overrides applied.
    Summary(SummaryArgs),
    /// Edit one field of a line item.
    Edit(EditArgs),
    /// Move a line item and its subtree.
    Move(MoveArgs),
    /// Make an item the last child of the category right above it.
    Indent(IdArgs),
    /// Make an item the sibling right after its parent.
    Outdent(IdArgs),
    /// Add a category or item.
    Insert(InsertArgs),
    /// Delete a line item and everything under it.
    Delete(IdArgs),
    /// Re-derive every with-BDI unit price and clear total overrides.
    Recalculate(RecalculateArgs),
    /// Replace the snapshot items with rows keyed by position code.
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Show every row regardless of collapse state.
    #[arg(long)]
    pub full: bool,
    /// Categories to expand. Ignored with `--full`.
    #[arg(long, value_delimiter = ',')]
    pub expand: Vec<Uuid>,
    /// Keep rows matching a name fragment or a position code prefix.
    #[arg(long)]
    pub filter: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SummaryArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: Uuid,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: Uuid,
    #[command(subcommand)]
    pub edit: EditCommand,
}

#[derive(Subcommand, Debug)]
pub enum EditCommand {
    /// Unit price before BDI.
    PriceEx { value: Money },
    /// Unit price with BDI; the price before BDI becomes derived.
    PriceWith { value: Money },
    ContractQuantity { value: Quantity },
    /// Contract total; the unit price is derived from it.
    ContractTotal { value: Money },
    CurrentQuantity { value: Quantity },
    CurrentPercentage { value: Percent },
    /// Current total; the current quantity is derived from it.
    CurrentTotal { value: Money },
    /// Measurement of earlier periods.
    Previous { quantity: Quantity, total: Money },
    Unit { value: String },
    Name { value: String },
}

impl From<EditCommand> for ItemEdit {
    fn from(value: EditCommand) -> Self {
        match value {
            EditCommand::PriceEx { value } => ItemEdit::UnitPrice(PriceEdit::ExMarkup(value)),
            EditCommand::PriceWith { value } => ItemEdit::UnitPrice(PriceEdit::WithMarkup(value)),
            EditCommand::ContractQuantity { value } => ItemEdit::ContractQuantity(value),
            EditCommand::ContractTotal { value } => ItemEdit::ContractTotal(value),
            EditCommand::CurrentQuantity { value } => ItemEdit::CurrentQuantity(value),
            EditCommand::CurrentPercentage { value } => ItemEdit::CurrentPercentage(value),
            EditCommand::CurrentTotal { value } => ItemEdit::CurrentTotal(value),
            EditCommand::Previous { quantity, total } => {
                ItemEdit::PreviousMeasurement { quantity, total }
            }
            EditCommand::Unit { value } => ItemEdit::Unit(value),
            EditCommand::Name { value } => ItemEdit::Name(value),
        }
    }
}

/// Destination of a moved or inserted record.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PlacementArgs {
    #[arg(long)]
    pub before: Option<Uuid>,
    #[arg(long)]
    pub after: Option<Uuid>,
    /// Parent category id, or `root`.
    #[arg(long)]
    pub into: Option<ParentRef>,
}

#[derive(Clone, Copy, Debug)]
pub enum ParentRef {
    Root,
    Category(Uuid),
}

impl FromStr for ParentRef {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("root") {
            Ok(ParentRef::Root)
        } else {
            s.parse().map(ParentRef::Category)
        }
    }
}

impl PlacementArgs {
    /// `index` only applies to `--into`; past the end appends.
    pub fn placement(&self, index: Option<usize>) -> Result<Placement> {
        match (self.before, self.after, self.into) {
            (Some(reference), None, None) => Ok(Placement::Before { reference }),
            (None, Some(reference), None) => Ok(Placement::After { reference }),
            (None, None, Some(parent)) => Ok(Placement::Into {
                parent: match parent {
                    ParentRef::Root => None,
                    ParentRef::Category(id) => Some(id),
                },
                index: index.unwrap_or(usize::MAX),
            }),
            _ => Err(AppError::Usage(
                "exactly one of --before, --after or --into is required".to_string(),
            )),
        }
    }
}

#[derive(Args, Debug)]
pub struct MoveArgs {
    pub id: Uuid,
    #[command(flatten)]
    pub placement: PlacementArgs,
    /// Position among the new siblings, used with `--into`.
    #[arg(long, requires = "into")]
    pub index: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InsertArgs {
    pub name: String,
    /// Insert a category instead of a priced item.
    #[arg(long)]
    pub category: bool,
    #[arg(long, default_value = "")]
    pub unit: String,
    #[arg(long, default_value = "0")]
    pub quantity: Quantity,
    /// Unit price before BDI.
    #[arg(long, default_value = "0")]
    pub price: Money,
    #[command(flatten)]
    pub placement: PlacementArgs,
    #[arg(long, requires = "into")]
    pub index: Option<usize>,
}

#[derive(Args, Debug)]
pub struct RecalculateArgs {
    /// Overwrites manually typed with-BDI prices and clears total overrides.
    #[arg(long)]
    pub confirm: bool,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON array of rows: `{code, name, kind, ...item fields}`.
    pub rows: PathBuf,
}
