//! Plain-text rendering of flattened rows and project summaries.

use std::fmt::Write;

use serde::Serialize;
use wbs_engine::{Figures, FlatRow, ItemId, ProjectSummary};

const INDENT: usize = 2;

pub fn table(rows: &[FlatRow<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:<40} {:>6} {:>12} {:>12} {:>14} {:>14} {:>8}",
        "code", "name", "unit", "quantity", "unit price", "contract", "accumulated", "done"
    );
    for row in rows {
        let node = row.node;
        let marker = match (row.has_children, row.expanded) {
            (false, _) => " ",
            (true, true) => "-",
            (true, false) => "+",
        };
        let name = format!(
            "{:indent$}{marker} {}",
            "",
            node.item.name,
            indent = node.depth * INDENT
        );
        let totals = node.totals();
        let (unit, quantity, price, done) = match &node.figures {
            Figures::Item(item) => (
                item.quantities.unit.clone(),
                item.quantities.contract_quantity.to_string(),
                item.unit_price_with_markup.to_string(),
                item.accumulated_percentage.to_string(),
            ),
            Figures::Category(category) => match category.quantities.uniform() {
                Some(quantities) => (
                    quantities.unit.clone(),
                    quantities.contract_quantity.to_string(),
                    String::new(),
                    category.accumulated_percentage.to_string(),
                ),
                None => (
                    String::new(),
                    String::new(),
                    String::new(),
                    category.accumulated_percentage.to_string(),
                ),
            },
        };
        let _ = writeln!(
            out,
            "{:<10} {:<40} {:>6} {:>12} {:>12} {:>14} {:>14} {:>8}",
            node.wbs_code.to_string(),
            name,
            unit,
            quantity,
            price,
            totals.contract_total.to_string(),
            totals.accumulated_total.to_string(),
            done
        );
    }
    out
}

pub fn summary(summary: &ProjectSummary) -> String {
    let flag = |overridden: bool| if overridden { " (override)" } else { "" };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "contract total:    {}{}",
        summary.contract_total,
        flag(summary.contract_total_overridden)
    );
    let _ = writeln!(
        out,
        "current total:     {}{}",
        summary.current_total,
        flag(summary.current_total_overridden)
    );
    let _ = writeln!(out, "current share:     {}", summary.current_percentage);
    let _ = writeln!(out, "previous total:    {}", summary.computed.previous_total);
    let _ = writeln!(out, "accumulated total: {}", summary.computed.accumulated_total);
    let _ = writeln!(out, "balance:           {}", summary.computed.balance_total);
    out
}

/// JSON view of one row.
#[derive(Serialize)]
pub struct JsonRow<'a> {
    pub id: ItemId,
    pub code: String,
    pub depth: usize,
    pub name: &'a str,
    pub has_children: bool,
    pub expanded: bool,
    pub figures: &'a Figures,
}

impl<'a> From<&FlatRow<'a>> for JsonRow<'a> {
    fn from(row: &FlatRow<'a>) -> Self {
        let node = row.node;
        Self {
            id: node.id(),
            code: node.wbs_code.to_string(),
            depth: node.depth,
            name: &node.item.name,
            has_children: row.has_children,
            expanded: row.expanded,
            figures: &node.figures,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use wbs_engine::{ItemFields, LineItem, Money, Percent, Quantity, Visibility, WbsEngine};

    use super::*;

    #[test]
    fn table_has_one_line_per_row() {
        let category = Uuid::from_u128(1);
        let items = vec![
            LineItem::category(category, None, 0, "Foundations"),
            LineItem::item(
                Uuid::from_u128(2),
                Some(category),
                0,
                "Concrete",
                ItemFields::priced("m3", Quantity::new(10_00), Money::new(100_00)),
            ),
        ];
        let tree = WbsEngine::builder().bdi(Percent::new(20_00)).build().process(&items);
        let rendered = table(&tree.flatten(Visibility::All));

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1 "));
        assert!(lines[1].contains("- Foundations"));
        assert!(lines[2].starts_with("1.1 "));
        assert!(lines[2].contains("1200.00"));
        assert!(lines[2].contains("120.00"));
    }
}
