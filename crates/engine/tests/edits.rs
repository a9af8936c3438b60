use uuid::Uuid;
use wbs_engine::{
    Diagnostic, EngineError, Field, FieldChange, ItemEdit, ItemFields, ItemPatch, LineItem, Money,
    Percent, PriceBasis, PriceEdit, ProjectOverrides, Quantity, WbsEngine, apply_edit, apply_markup,
    remove_markup,
};

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn engine(bdi: i64) -> WbsEngine {
    WbsEngine::builder().bdi(Percent::new(bdi)).build()
}

fn measured(contract: i64, previous: i64) -> LineItem {
    LineItem::item(
        id(1),
        None,
        0,
        "Masonry",
        ItemFields::priced("m2", Quantity::new(contract), Money::new(10_00))
            .with_previous(Quantity::new(previous), Money::new(previous * 10)),
    )
}

fn fields(item: &LineItem) -> &ItemFields {
    item.fields().unwrap()
}

#[test]
fn markup_round_trip_stays_within_a_cent() {
    for bdi in (0..=100_00).step_by(137).map(Percent::new) {
        for cents in [0, 1, 99, 1_00, 12_345, 987_654_321] {
            let price = Money::new(cents);
            let back = remove_markup(apply_markup(price, bdi), bdi);
            assert!((back - price).cents().abs() <= 1, "{price} at {bdi} came back as {back}");
        }
    }
}

#[test]
fn current_quantity_above_remaining_is_clamped() {
    let item = measured(100_00, 60_00);
    let outcome = apply_edit(&item, ItemEdit::CurrentQuantity(Quantity::new(55_00)), Percent::ZERO)
        .unwrap();

    assert_eq!(fields(&outcome.item).current_quantity, Quantity::new(40_00));
    assert_eq!(
        outcome.diagnostics,
        vec![Diagnostic::Clamped {
            id: id(1),
            field: Field::CurrentQuantity,
            requested: "55.00".to_string(),
            applied: "40.00".to_string(),
        }]
    );
}

#[test]
fn negative_current_quantity_is_clamped_to_zero() {
    let item = measured(100_00, 0);
    let outcome = apply_edit(&item, ItemEdit::CurrentQuantity(Quantity::new(-3_00)), Percent::ZERO)
        .unwrap();
    assert_eq!(fields(&outcome.item).current_quantity, Quantity::ZERO);
    // Nothing stored changed.
    assert_eq!(outcome.patch, None);
}

#[test]
fn current_percentage_clamps_to_what_remains() {
    let item = measured(100_00, 60_00);
    let outcome = apply_edit(
        &item,
        ItemEdit::CurrentPercentage(Percent::new(50_00)),
        Percent::ZERO,
    )
    .unwrap();

    assert_eq!(fields(&outcome.item).current_quantity, Quantity::new(40_00));
    assert!(matches!(
        &outcome.diagnostics[..],
        [Diagnostic::Clamped { field: Field::CurrentPercentage, applied, .. }] if applied == "40.00%"
    ));

    let tree = engine(0).process(std::slice::from_ref(&outcome.item));
    let wbs_engine::Figures::Item(figures) = &tree.get(id(1)).unwrap().figures else {
        panic!("expected item figures");
    };
    assert_eq!(figures.current_percentage, Percent::new(40_00));
}

#[test]
fn current_percentage_without_contract_is_zero() {
    let item = measured(0, 0);
    let outcome =
        apply_edit(&item, ItemEdit::CurrentPercentage(Percent::new(10_00)), Percent::ZERO)
            .unwrap();
    assert_eq!(fields(&outcome.item).current_quantity, Quantity::ZERO);
    assert_eq!(outcome.diagnostics.len(), 1);
}

#[test]
fn lowering_contract_quantity_pulls_current_back() {
    let item = LineItem::item(
        id(1),
        None,
        0,
        "Paint",
        ItemFields::priced("m2", Quantity::new(100_00), Money::new(5_00))
            .with_current(Quantity::new(80_00)),
    );
    let outcome = apply_edit(
        &item,
        ItemEdit::ContractQuantity(Quantity::new(50_00)),
        Percent::ZERO,
    )
    .unwrap();

    let patch = outcome.patch.unwrap();
    assert_eq!(
        patch.changes,
        vec![
            FieldChange::ContractQuantity(Quantity::new(50_00)),
            FieldChange::CurrentQuantity(Quantity::new(50_00)),
        ]
    );
}

#[test]
fn with_markup_edit_makes_ex_markup_derived() {
    let item = measured(10_00, 0);
    let outcome = apply_edit(
        &item,
        ItemEdit::UnitPrice(PriceEdit::WithMarkup(Money::new(150_00))),
        Percent::new(25_00),
    )
    .unwrap();

    let edited = fields(&outcome.item);
    assert_eq!(edited.unit_price_with_markup, Money::new(150_00));
    assert_eq!(edited.unit_price_ex_markup, Money::new(120_00));
    assert_eq!(edited.price_basis, PriceBasis::WithMarkup);
    let patch = outcome.patch.unwrap();
    assert!(patch.touches(|change| matches!(change, FieldChange::PriceBasis(_))));
}

#[test]
fn ex_markup_edit_derives_with_markup() {
    let item = measured(10_00, 0);
    let outcome = apply_edit(
        &item,
        ItemEdit::UnitPrice(PriceEdit::ExMarkup(Money::new(33_33))),
        Percent::new(20_00),
    )
    .unwrap();

    let edited = fields(&outcome.item);
    // 33.33 × 1.2 = 39.996
    assert_eq!(edited.unit_price_with_markup, Money::new(40_00));
    assert_eq!(edited.price_basis, PriceBasis::ExMarkup);
}

#[test]
fn contract_total_derives_unit_price_toward_zero() {
    let item = measured(3_00, 0);
    let outcome = apply_edit(
        &item,
        ItemEdit::ContractTotal(Money::new(100_00)),
        Percent::new(20_00),
    )
    .unwrap();

    let edited = fields(&outcome.item);
    assert_eq!(edited.unit_price_with_markup, Money::new(33_33));
    assert_eq!(edited.unit_price_ex_markup, Money::new(27_78));
    assert_eq!(edited.price_basis, PriceBasis::WithMarkup);
}

#[test]
fn contract_total_needs_a_quantity() {
    let item = measured(0, 0);
    let err = apply_edit(&item, ItemEdit::ContractTotal(Money::new(100_00)), Percent::ZERO)
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}

#[test]
fn current_total_derives_quantity() {
    let item = measured(10_00, 0);
    let outcome =
        apply_edit(&item, ItemEdit::CurrentTotal(Money::new(25_55)), Percent::ZERO).unwrap();
    assert_eq!(fields(&outcome.item).current_quantity, Quantity::new(2_55));
}

#[test]
fn category_rejects_field_edits_but_accepts_rename() {
    let category = LineItem::category(id(7), None, 0, "Roof");

    let err = apply_edit(
        &category,
        ItemEdit::CurrentQuantity(Quantity::new(1_00)),
        Percent::ZERO,
    )
    .unwrap_err();
    assert_eq!(err, EngineError::NotAnItem(id(7).to_string()));

    let outcome =
        apply_edit(&category, ItemEdit::Name("  Roofing ".to_string()), Percent::ZERO).unwrap();
    assert_eq!(outcome.item.name, "Roofing");
    assert_eq!(
        outcome.patch.unwrap().changes,
        vec![FieldChange::Name("Roofing".to_string())]
    );
}

#[test]
fn engine_edit_reports_unknown_id() {
    let items = vec![measured(1_00, 0)];
    let err = engine(0)
        .edit(&items, id(404), ItemEdit::Unit("kg".to_string()))
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[test]
fn edit_serializes_with_tag() {
    let edit: ItemEdit =
        serde_json::from_str(r#"{"edit":"current_percentage","value":12.5}"#).unwrap();
    assert_eq!(edit, ItemEdit::CurrentPercentage(Percent::new(12_50)));

    let edit: ItemEdit = serde_json::from_str(
        r#"{"edit":"unit_price","value":{"field":"with_markup","value":"10,50"}}"#,
    )
    .unwrap();
    assert_eq!(
        edit,
        ItemEdit::UnitPrice(PriceEdit::WithMarkup(Money::new(10_50)))
    );
}

#[test]
fn summary_applies_overrides() {
    let items = vec![
        LineItem::item(
            id(1),
            None,
            0,
            "Steel",
            ItemFields::priced("kg", Quantity::new(100_00), Money::new(10_00))
                .with_current(Quantity::new(25_00)),
        ),
    ];
    let engine = engine(0);

    let plain = engine.summary(&items, &ProjectOverrides::default());
    assert_eq!(plain.contract_total, Money::new(1_000_00));
    assert_eq!(plain.current_percentage, Percent::new(25_00));
    assert!(!plain.contract_total_overridden);

    let overrides = ProjectOverrides {
        contract_total_override: Some(Money::new(500_00)),
        current_total_override: None,
    };
    let summary = engine.summary(&items, &overrides);
    assert_eq!(summary.contract_total, Money::new(500_00));
    assert_eq!(summary.computed.contract_total, Money::new(1_000_00));
    assert_eq!(summary.current_total, Money::new(250_00));
    assert_eq!(summary.current_percentage, Percent::new(50_00));
    assert!(summary.contract_total_overridden);
}

#[test]
fn recalculate_all_resets_prices_and_clears_overrides() {
    let mut typed = ItemFields::priced("un", Quantity::new(1_00), Money::new(100_00));
    typed.unit_price_with_markup = Money::new(999_00);
    typed.price_basis = PriceBasis::WithMarkup;
    let items = vec![
        LineItem::category(id(1), None, 0, "Finishes"),
        LineItem::item(id(2), Some(id(1)), 0, "Typed", typed),
        LineItem::item(
            id(3),
            Some(id(1)),
            1,
            "Derived",
            ItemFields::priced("un", Quantity::new(1_00), Money::new(50_00)),
        ),
    ];
    let overrides = ProjectOverrides {
        contract_total_override: Some(Money::new(1_00)),
        current_total_override: Some(Money::new(2_00)),
    };

    let recalculation = engine(10_00).recalculate_all(&items, &overrides);

    assert!(recalculation.overrides.is_empty());
    assert_eq!(recalculation.discarded_overrides, overrides);
    let typed = fields(&recalculation.items[1]);
    assert_eq!(typed.unit_price_with_markup, Money::new(110_00));
    assert_eq!(typed.price_basis, PriceBasis::ExMarkup);
    // Record 3 stored a zero with-markup price, so it changes too.
    let patched: Vec<Uuid> = recalculation.patches.iter().map(|patch| patch.id).collect();
    assert_eq!(patched, vec![id(2), id(3)]);

    // A second run has nothing left to do.
    let again = engine(10_00).recalculate_all(&recalculation.items, &recalculation.overrides);
    assert!(again.patches.is_empty());
}

#[test]
fn recalculate_all_patches_records_sharing_an_id_separately() {
    let items = vec![
        LineItem::item(
            id(1),
            None,
            0,
            "First",
            ItemFields::priced("m", Quantity::new(1_00), Money::new(10_00)),
        ),
        LineItem::item(
            id(1),
            None,
            1,
            "Second",
            ItemFields::priced("kg", Quantity::new(2_00), Money::new(20_00)),
        ),
    ];

    let recalculation = engine(10_00).recalculate_all(&items, &ProjectOverrides::default());

    assert_eq!(
        recalculation.patches,
        vec![
            ItemPatch {
                id: id(1),
                changes: vec![FieldChange::UnitPriceWithMarkup(Money::new(11_00))],
            },
            ItemPatch {
                id: id(1),
                changes: vec![FieldChange::UnitPriceWithMarkup(Money::new(22_00))],
            },
        ]
    );
    let again = engine(10_00).recalculate_all(&recalculation.items, &recalculation.overrides);
    assert_eq!(again.patches, Vec::new());
}
