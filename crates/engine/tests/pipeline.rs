use std::collections::HashSet;

use uuid::Uuid;
use wbs_engine::{
    BalancePolicy, Diagnostic, Figures, FlatRow, ItemFields, LineItem, Money, Percent,
    ProcessedTree, Quantity, QuantityRollup, Visibility, WbsEngine,
};

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn engine(bdi: i64) -> WbsEngine {
    WbsEngine::builder().bdi(Percent::new(bdi)).build()
}

fn names(rows: Vec<FlatRow<'_>>) -> Vec<String> {
    rows.iter().map(|row| row.node.wbs_code.to_string()).collect()
}

fn code(tree: &ProcessedTree, n: u128) -> String {
    tree.get(id(n)).unwrap().wbs_code.to_string()
}

/// Two-level budget:
///
/// ```text
/// 1   Site works            (10)
/// 1.1   Earthworks          (11)
/// 1.1.1   Excavation   m3   (111)
/// 1.1.2   Backfill     m3   (112)
/// 1.2   Fencing        m    (12)
/// 2   Structure             (20)
/// 2.1   Concrete       m3   (21)
/// ```
fn budget() -> Vec<LineItem> {
    vec![
        // Deliberately out of order: leaves before parents, shuffled orders.
        LineItem::item(
            id(112),
            Some(id(11)),
            7,
            "Backfill",
            ItemFields::priced("m3", Quantity::new(3_33), Money::new(10_01))
                .with_current(Quantity::new(1_00)),
        ),
        LineItem::item(
            id(111),
            Some(id(11)),
            2,
            "Excavation",
            ItemFields::priced("m3", Quantity::new(12_50), Money::new(33_33))
                .with_previous(Quantity::new(5_00), Money::new(199_98))
                .with_current(Quantity::new(2_50)),
        ),
        LineItem::category(id(20), None, 5, "Structure"),
        LineItem::item(
            id(12),
            Some(id(10)),
            9,
            "Fencing",
            ItemFields::priced("m", Quantity::new(40_00), Money::new(15_75)),
        ),
        LineItem::category(id(11), Some(id(10)), 1, "Earthworks"),
        LineItem::item(
            id(21),
            Some(id(20)),
            0,
            "Concrete",
            ItemFields::priced("m3", Quantity::new(8_00), Money::new(450_00)),
        ),
        LineItem::category(id(10), None, 0, "Site works"),
    ]
}

#[test]
fn foundations_scenario() {
    let items = vec![
        LineItem::category(id(1), None, 0, "Foundations"),
        LineItem::item(
            id(2),
            Some(id(1)),
            0,
            "Concrete",
            ItemFields::priced("m3", Quantity::new(10_00), Money::new(100_00)),
        ),
    ];

    let tree = engine(20_00).process(&items);

    let Figures::Item(item) = &tree.get(id(2)).unwrap().figures else {
        panic!("expected item figures");
    };
    assert_eq!(item.unit_price_with_markup, Money::new(120_00));
    assert_eq!(item.totals.contract_total, Money::new(1_200_00));

    let category = tree.get(id(1)).unwrap();
    assert_eq!(category.totals().contract_total, Money::new(1_200_00));
    assert_eq!(code(&tree, 1), "1");
    assert_eq!(code(&tree, 2), "1.1");
    assert!(tree.diagnostics().is_empty());
}

#[test]
fn codes_and_depths_follow_sibling_order() {
    let tree = engine(0).process(&budget());

    assert_eq!(code(&tree, 10), "1");
    assert_eq!(code(&tree, 11), "1.1");
    assert_eq!(code(&tree, 111), "1.1.1");
    assert_eq!(code(&tree, 112), "1.1.2");
    assert_eq!(code(&tree, 12), "1.2");
    assert_eq!(code(&tree, 20), "2");
    assert_eq!(code(&tree, 21), "2.1");
    assert_eq!(tree.get(id(112)).unwrap().depth, 2);
    assert_eq!(tree.get(id(20)).unwrap().depth, 0);
}

#[test]
fn equal_orders_keep_input_sequence() {
    let items = vec![
        LineItem::category(id(3), None, 1, "Third"),
        LineItem::category(id(1), None, 0, "First"),
        LineItem::category(id(2), None, 1, "Second"),
    ];
    let tree = engine(0).process(&items);
    assert_eq!(code(&tree, 1), "1");
    assert_eq!(code(&tree, 3), "2");
    assert_eq!(code(&tree, 2), "3");
}

#[test]
fn category_totals_equal_sum_of_children_at_every_depth() {
    let tree = engine(27_35).process(&budget());

    for node in tree.nodes() {
        if !node.item.is_category() {
            continue;
        }
        let children: Vec<_> = node.children.iter().map(|&c| tree.node(c).totals()).collect();
        let sum = |f: fn(&wbs_engine::Totals) -> Money| children.iter().map(|t| f(t)).sum::<Money>();
        let totals = node.totals();
        assert_eq!(totals.contract_total, sum(|t| t.contract_total), "{}", node.item.name);
        assert_eq!(totals.previous_total, sum(|t| t.previous_total));
        assert_eq!(totals.current_total, sum(|t| t.current_total));
        assert_eq!(totals.accumulated_total, sum(|t| t.accumulated_total));
        assert_eq!(totals.balance_total, sum(|t| t.balance_total));
    }

    let roots: Money = tree
        .roots()
        .iter()
        .map(|&r| tree.node(r).totals().contract_total)
        .sum();
    assert_eq!(tree.totals().contract_total, roots);
}

#[test]
fn item_figures_cover_all_stages() {
    let tree = engine(0).process(&budget());
    let Figures::Item(excavation) = &tree.get(id(111)).unwrap().figures else {
        panic!("expected item figures");
    };

    // 12.50 × 33.33 = 416.625 -> 416.63
    assert_eq!(excavation.totals.contract_total, Money::new(416_63));
    // 2.50 × 33.33 = 83.325 -> 83.33
    assert_eq!(excavation.totals.current_total, Money::new(83_33));
    assert_eq!(excavation.totals.accumulated_total, Money::new(283_31));
    assert_eq!(excavation.totals.balance_total, Money::new(133_32));
    assert_eq!(excavation.quantities.accumulated_quantity, Quantity::new(7_50));
    assert_eq!(excavation.quantities.balance_quantity, Quantity::new(5_00));
    assert_eq!(excavation.previous_percentage, Percent::new(40_00));
    assert_eq!(excavation.current_percentage, Percent::new(20_00));
    assert_eq!(excavation.accumulated_percentage, Percent::new(60_00));
}

#[test]
fn quantity_rollup_only_for_uniform_units() {
    let tree = engine(0).process(&budget());

    let Figures::Category(earthworks) = &tree.get(id(11)).unwrap().figures else {
        panic!("expected category figures");
    };
    let QuantityRollup::Uniform(quantities) = &earthworks.quantities else {
        panic!("earthworks only uses m3");
    };
    assert_eq!(quantities.unit, "m3");
    assert_eq!(quantities.contract_quantity, Quantity::new(15_83));
    assert_eq!(quantities.current_quantity, Quantity::new(3_50));
    assert_eq!(earthworks.item_count, 2);

    // m3 + m under the same root.
    let Figures::Category(site) = &tree.get(id(10)).unwrap().figures else {
        panic!("expected category figures");
    };
    assert_eq!(site.quantities, QuantityRollup::MixedUnits);
    assert_eq!(site.item_count, 3);
    assert!(tree.get(id(10)).unwrap().figures.quantities().is_none());
}

#[test]
fn empty_category_is_not_mixed() {
    let items = vec![LineItem::category(id(1), None, 0, "Empty")];
    let tree = engine(0).process(&items);
    let Figures::Category(figures) = &tree.get(id(1)).unwrap().figures else {
        panic!("expected category figures");
    };
    assert_eq!(figures.quantities, QuantityRollup::NoItems);
    assert_eq!(figures.totals.contract_total, Money::ZERO);
    assert_eq!(figures.current_percentage, Percent::ZERO);
}

#[test]
fn dangling_parent_is_demoted_not_lost() {
    let mut items = budget();
    items.push(LineItem::item(
        id(99),
        Some(id(12345)),
        0,
        "Stray",
        ItemFields::priced("un", Quantity::new(1_00), Money::new(1_00)),
    ));

    let tree = engine(0).process(&items);

    assert_eq!(tree.len(), items.len());
    let stray = tree.get(id(99)).unwrap();
    assert_eq!(stray.parent, None);
    assert_eq!(stray.depth, 0);
    assert!(tree.diagnostics().contains(&Diagnostic::DanglingParent {
        id: id(99),
        parent_id: id(12345),
    }));
}

#[test]
fn item_parent_is_demoted() {
    let mut items = budget();
    items.push(LineItem::category(id(98), Some(id(21)), 0, "Under an item"));

    let tree = engine(0).process(&items);

    assert_eq!(tree.get(id(98)).unwrap().parent, None);
    assert!(tree.diagnostics().contains(&Diagnostic::ParentNotCategory {
        id: id(98),
        parent_id: id(21),
    }));
}

#[test]
fn cycle_is_broken_and_reported() {
    let items = vec![
        LineItem::category(id(1), Some(id(3)), 0, "A"),
        LineItem::category(id(2), Some(id(1)), 0, "B"),
        LineItem::category(id(3), Some(id(2)), 0, "C"),
    ];

    let tree = engine(0).process(&items);

    assert_eq!(tree.len(), 3);
    assert_eq!(tree.diagnostics(), &[Diagnostic::CycleBroken { id: id(1) }]);
    assert_eq!(code(&tree, 1), "1");
    assert_eq!(code(&tree, 2), "1.1");
    assert_eq!(code(&tree, 3), "1.1.1");
}

#[test]
fn duplicate_ids_keep_both_records() {
    let items = vec![
        LineItem::category(id(1), None, 0, "Masonry"),
        LineItem::category(id(1), None, 1, "Masonry copy"),
        LineItem::item(
            id(2),
            Some(id(1)),
            0,
            "Blocks",
            ItemFields::priced("m2", Quantity::new(4_00), Money::new(25_00)),
        ),
    ];

    let tree = engine(0).process(&items);

    assert_eq!(tree.len(), 3);
    assert!(
        tree.diagnostics()
            .contains(&Diagnostic::DuplicateId { id: id(1) })
    );
    let rows: Vec<(String, &str)> = tree
        .flatten(Visibility::All)
        .iter()
        .map(|row| (row.node.wbs_code.to_string(), row.node.item.name.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("1".to_string(), "Masonry"),
            ("1.1".to_string(), "Blocks"),
            ("2".to_string(), "Masonry copy"),
        ]
    );
    // The first occurrence owns the id, so lookups and rollups land on it.
    let owner = tree.get(id(1)).unwrap();
    assert_eq!(owner.item.name, "Masonry");
    assert_eq!(owner.totals().contract_total, Money::new(100_00));
}

#[test]
fn stored_out_of_range_values_are_clamped_on_read() {
    let items = vec![LineItem::item(
        id(1),
        None,
        0,
        "Over-measured",
        ItemFields::priced("m", Quantity::new(10_00), Money::new(10_00))
            .with_previous(Quantity::new(8_00), Money::new(80_00))
            .with_current(Quantity::new(5_00)),
    )];

    let tree = engine(0).process(&items);
    let Figures::Item(figures) = &tree.get(id(1)).unwrap().figures else {
        panic!("expected item figures");
    };
    assert_eq!(figures.quantities.current_quantity, Quantity::new(2_00));
    assert_eq!(tree.diagnostics().len(), 1);
    // The input is never rewritten by a read.
    assert_eq!(items[0].fields().unwrap().current_quantity, Quantity::new(5_00));
}

#[test]
fn overrun_balance_follows_policy() {
    let items = vec![LineItem::item(
        id(1),
        None,
        0,
        "Overrun",
        ItemFields::priced("m", Quantity::new(10_00), Money::new(10_00))
            .with_previous(Quantity::new(12_00), Money::new(120_00)),
    )];

    let clamped = engine(0).process(&items);
    assert_eq!(clamped.totals().balance_total, Money::ZERO);

    let overrun = WbsEngine::builder()
        .balance_policy(BalancePolicy::AllowOverrun)
        .build()
        .process(&items);
    assert_eq!(overrun.totals().balance_total, Money::new(-20_00));
    let Figures::Item(figures) = &overrun.get(id(1)).unwrap().figures else {
        panic!("expected item figures");
    };
    assert_eq!(figures.quantities.balance_quantity, Quantity::new(-2_00));
}

#[test]
fn with_markup_basis_survives_bdi_change() {
    let mut fields = ItemFields::priced("un", Quantity::new(1_00), Money::new(100_00));
    fields.unit_price_with_markup = Money::new(130_00);
    fields.price_basis = wbs_engine::PriceBasis::WithMarkup;
    let items = vec![LineItem::item(id(1), None, 0, "Typed price", fields)];

    let tree = engine(30_00).process(&items);
    let Figures::Item(figures) = &tree.get(id(1)).unwrap().figures else {
        panic!("expected item figures");
    };
    assert_eq!(figures.unit_price_with_markup, Money::new(130_00));
    assert_eq!(figures.unit_price_ex_markup, Money::new(100_00));

    let tree = engine(10_00).process(&items);
    let Figures::Item(figures) = &tree.get(id(1)).unwrap().figures else {
        panic!("expected item figures");
    };
    assert_eq!(figures.unit_price_with_markup, Money::new(130_00));
    // 130 / 1.1 = 118.1818 -> 118.18
    assert_eq!(figures.unit_price_ex_markup, Money::new(118_18));
}

#[test]
fn flatten_respects_expanded_set() {
    let tree = engine(0).process(&budget());

    let collapsed = HashSet::new();
    assert_eq!(names(tree.flatten(Visibility::Expanded(&collapsed))), vec!["1", "2"]);

    let expanded = HashSet::from([id(10)]);
    assert_eq!(
        names(tree.flatten(Visibility::Expanded(&expanded))),
        vec!["1", "1.1", "1.2", "2"]
    );

    // Expanding a nested category whose parent is collapsed shows nothing new.
    let nested_only = HashSet::from([id(11)]);
    assert_eq!(names(tree.flatten(Visibility::Expanded(&nested_only))), vec!["1", "2"]);

    assert_eq!(
        names(tree.flatten(Visibility::All)),
        vec!["1", "1.1", "1.1.1", "1.1.2", "1.2", "2", "2.1"]
    );
}

#[test]
fn flatten_marks_rows() {
    let tree = engine(0).process(&budget());
    let expanded = HashSet::from([id(10)]);
    let rows = tree.flatten(Visibility::Expanded(&expanded));

    assert!(rows[0].has_children && rows[0].expanded);
    assert!(rows[1].has_children && !rows[1].expanded);
    assert!(!rows[2].has_children && !rows[2].expanded);
    assert_eq!(rows[1].node.depth, 1);
}

#[test]
fn filter_keeps_matches_and_ancestors_only() {
    let tree = engine(0).process(&budget());
    let codes = |query: &str| -> Vec<String> {
        tree.filter(query)
            .iter()
            .map(|row| row.node.wbs_code.to_string())
            .collect()
    };

    // Deep leaf: its ancestors come along, its siblings and cousins do not.
    assert_eq!(codes("BACKFILL"), vec!["1", "1.1", "1.1.2"]);
    assert_eq!(codes("concrete"), vec!["2", "2.1"]);
    // Position code prefix matches the subtree below it.
    assert_eq!(codes("1.1"), vec!["1", "1.1", "1.1.1", "1.1.2"]);
    assert!(codes("nothing like this").is_empty());
    assert_eq!(codes("  ").len(), 7);
}

#[test]
fn filtered_category_without_matching_children_is_not_expanded() {
    let tree = engine(0).process(&budget());
    let rows = tree.filter("earthworks");

    assert_eq!(names(rows.clone()), vec!["1", "1.1"]);
    assert!(rows[0].has_children && rows[0].expanded);
    assert!(rows[1].has_children && !rows[1].expanded);
}

#[test]
fn filter_ignores_accents() {
    let items = vec![
        LineItem::category(id(1), None, 0, "Fundações"),
        LineItem::category(id(2), None, 1, "Alvenaria"),
    ];
    let tree = engine(0).process(&items);
    let rows = tree.filter("fundacoes");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].node.id(), id(1));
}

#[test]
fn processed_figures_serialize_for_export() {
    let tree = engine(20_00).process(&budget());
    let json = serde_json::to_value(&tree.get(id(11)).unwrap().figures).unwrap();
    assert_eq!(json["kind"], "category");
    assert_eq!(json["quantities"]["state"], "uniform");
    assert_eq!(json["quantities"]["unit"], "m3");
}
