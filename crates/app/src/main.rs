use std::collections::HashSet;

use clap::Parser;
use serde::Serialize;
use uuid::Uuid;
use wbs_engine::{
    Diagnostic, ImportRow, ItemFields, ItemId, ItemPatch, LineItem, Restructure, Visibility,
    WbsEngine, plan_import,
};

use cli::{Cli, Command};
use error::{AppError, Result};
use settings::AppConfig;
use snapshot::ProjectSnapshot;

mod cli;
mod error;
mod render;
mod settings;
mod snapshot;

/// Printed by every mutating command.
#[derive(Serialize)]
struct Report<'a> {
    patches: &'a [ItemPatch],
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<ItemId>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    removed: &'a [ItemId],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    diagnostics: &'a [Diagnostic],
}

fn main() {
    if let Err(err) = run() {
        eprintln!("wbs: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = settings::load(&cli.global)?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "wbs={level},wbs_engine={level}",
            level = settings.log_level
        ))
        .init();

    let mut snapshot = if matches!(cli.command, Command::Import(_)) && !settings.snapshot.exists() {
        ProjectSnapshot::default()
    } else {
        ProjectSnapshot::load(&settings.snapshot)?
    };
    let engine = engine_for(&settings, &snapshot);
    tracing::debug!(
        snapshot = %settings.snapshot.display(),
        items = snapshot.items.len(),
        bdi = %engine.bdi(),
        "snapshot loaded"
    );

    let write = cli.global.write;
    match cli.command {
        Command::Tree(args) => {
            let tree = engine.process(&snapshot.items);
            let expanded: HashSet<Uuid> = args.expand.into_iter().collect();
            let rows = match &args.filter {
                Some(query) => tree.filter(query),
                None if args.full => tree.flatten(Visibility::All),
                None => tree.flatten(Visibility::Expanded(&expanded)),
            };
            if args.json {
                let rows: Vec<render::JsonRow<'_>> = rows.iter().map(Into::into).collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{}", render::table(&rows));
            }
        }
        Command::Summary(args) => {
            let summary = engine.summary(&snapshot.items, &snapshot.overrides);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", render::summary(&summary));
            }
        }
        Command::Edit(args) => {
            let outcome = engine.edit(&snapshot.items, args.id, args.edit.into())?;
            let patches: Vec<ItemPatch> = outcome.patch.into_iter().collect();
            print_report(&Report {
                patches: &patches,
                created: None,
                removed: &[],
                diagnostics: &outcome.diagnostics,
            })?;
            if let Some(item) = snapshot.items.iter_mut().find(|item| item.id == args.id) {
                *item = outcome.item;
            }
            finish(&snapshot, &settings, write, !patches.is_empty())?;
        }
        Command::Move(args) => {
            let placement = args.placement.placement(args.index)?;
            let result = wbs_engine::move_item(&snapshot.items, args.id, placement)?;
            apply_restructure(&mut snapshot, result, &settings, write)?;
        }
        Command::Indent(args) => {
            let result = wbs_engine::indent(&snapshot.items, args.id)?;
            apply_restructure(&mut snapshot, result, &settings, write)?;
        }
        Command::Outdent(args) => {
            let result = wbs_engine::outdent(&snapshot.items, args.id)?;
            apply_restructure(&mut snapshot, result, &settings, write)?;
        }
        Command::Insert(args) => {
            let placement = args.placement.placement(args.index)?;
            let id = Uuid::new_v4();
            let item = if args.category {
                LineItem::category(id, None, 0, args.name.trim())
            } else {
                LineItem::item(
                    id,
                    None,
                    0,
                    args.name.trim(),
                    ItemFields::priced(args.unit.trim(), args.quantity, args.price),
                )
            };
            let result = wbs_engine::insert_item(&snapshot.items, item, placement)?;
            apply_restructure(&mut snapshot, result, &settings, write)?;
        }
        Command::Delete(args) => {
            let result = wbs_engine::delete_item(&snapshot.items, args.id)?;
            apply_restructure(&mut snapshot, result, &settings, write)?;
        }
        Command::Recalculate(args) => {
            if !args.confirm {
                return Err(AppError::Usage(
                    "recalculate overwrites typed with-BDI prices and clears total overrides; \
                     pass --confirm to proceed"
                        .to_string(),
                ));
            }
            let recalculation = engine.recalculate_all(&snapshot.items, &snapshot.overrides);
            print_report(&Report {
                patches: &recalculation.patches,
                created: None,
                removed: &[],
                diagnostics: &[],
            })?;
            let changed =
                !recalculation.patches.is_empty() || !recalculation.discarded_overrides.is_empty();
            if !recalculation.discarded_overrides.is_empty() {
                tracing::info!(overrides = ?recalculation.discarded_overrides, "overrides cleared");
            }
            snapshot.items = recalculation.items;
            snapshot.overrides = recalculation.overrides;
            finish(&snapshot, &settings, write, changed)?;
        }
        Command::Import(args) => {
            let raw = std::fs::read_to_string(&args.rows)?;
            let rows: Vec<ImportRow> = serde_json::from_str(&raw)?;
            let plan = plan_import(rows);
            let diagnostics = plan.diagnostics.clone();
            let items = plan.into_line_items_v4();
            tracing::info!(
                rows = items.len(),
                diagnostics = diagnostics.len(),
                "rows imported"
            );
            print_report(&Report {
                patches: &[],
                created: None,
                removed: &[],
                diagnostics: &diagnostics,
            })?;
            snapshot.items = items;
            finish(&snapshot, &settings, write, true)?;
        }
    }

    Ok(())
}

fn engine_for(settings: &AppConfig, snapshot: &ProjectSnapshot) -> WbsEngine {
    WbsEngine::builder()
        .bdi(snapshot.bdi.unwrap_or(settings.bdi))
        .balance_policy(settings.balance_policy)
        .build()
}

fn apply_restructure(
    snapshot: &mut ProjectSnapshot,
    result: Restructure,
    settings: &AppConfig,
    write: bool,
) -> Result<()> {
    print_report(&Report {
        patches: &result.patches,
        created: result.created,
        removed: &result.removed,
        diagnostics: &[],
    })?;
    let changed =
        !result.patches.is_empty() || result.created.is_some() || !result.removed.is_empty();
    snapshot.items = result.items;
    finish(snapshot, settings, write, changed)
}

fn print_report(report: &Report<'_>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn finish(snapshot: &ProjectSnapshot, settings: &AppConfig, write: bool, changed: bool) -> Result<()> {
    if !changed {
        tracing::info!("nothing changed");
        return Ok(());
    }
    if write {
        snapshot.save(&settings.snapshot)?;
    } else {
        tracing::info!("dry run, pass --write to update the snapshot");
    }
    Ok(())
}
