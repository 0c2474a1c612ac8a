// Lumber Estimator - CLI
// Two modes: import a contractor catalog CSV into SQLite, or estimate a
// materials list (the document analyzer's JSON output) against a catalog.

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs;
use std::path::Path;

use lumber_estimator::{
    db, import_catalog_csv, EstimationEngine, EstimationRun, MaterialsPayload,
};

const DEFAULT_DB: &str = "lumber_estimator.db";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("import") => run_import(&args[2..]),
        Some("estimate") => run_estimate(&args[2..]),
        Some("runs") => run_history(&args[2..]),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("Lumber Estimator {}", lumber_estimator::VERSION);
    println!();
    println!("Usage:");
    println!("  lumber-estimator import <catalog.csv> [db_path]");
    println!("  lumber-estimator estimate <materials.json> [db_path] [contractor]");
    println!("  lumber-estimator runs [db_path]");
}

/// Import mode: contractor catalog CSV → SQLite
fn run_import(args: &[String]) -> Result<()> {
    let Some(csv_path) = args.first() else {
        bail!("import requires a catalog CSV path");
    };
    let db_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_DB);

    println!("🗄️  Catalog Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Reading {}...", csv_path);
    let import = import_catalog_csv(Path::new(csv_path))?;
    println!(
        "✓ Parsed {} material(s) across {} contractor(s)",
        import.report.materials_added, import.report.contractors_added
    );
    for error in &import.report.errors {
        println!("⚠️  {}", error);
    }

    println!("\n🔧 Setting up database at {}...", db_path);
    let conn = Connection::open(db_path)?;
    db::setup_database(&conn)?;

    println!("\n💾 Inserting catalog...");
    db::insert_contractors(&conn, &import.contractors)?;
    db::insert_catalog_entries(&conn, &import.entries)?;

    let count = db::catalog_count(&conn)?;
    println!("✓ Database now holds {} catalog entries", count);

    Ok(())
}

/// Estimate mode: materials JSON + stored catalog → estimate + accuracy
fn run_estimate(args: &[String]) -> Result<()> {
    let Some(materials_path) = args.first() else {
        bail!("estimate requires a materials JSON path");
    };
    let db_path = args.get(1).map(String::as_str).unwrap_or(DEFAULT_DB);
    let contractor = args.get(2).map(String::as_str);

    println!("🏗️  Lumber Estimation Run");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📄 Reading materials from {}...", materials_path);
    let document = fs::read(materials_path)
        .with_context(|| format!("Failed to read materials file: {}", materials_path))?;
    let payload = MaterialsPayload::from_json(
        std::str::from_utf8(&document).context("Materials file is not UTF-8")?,
    )?;
    println!("✓ {} material(s) extracted upstream", payload.materials.len());

    println!("\n🗄️  Loading catalog from {}...", db_path);
    let conn = Connection::open(db_path)?;
    db::setup_database(&conn)?;
    let catalog = db::get_catalog(&conn, contractor)?;
    match contractor {
        Some(name) => println!("✓ {} entries for {}", catalog.len(), name),
        None => println!("✓ {} entries (all contractors)", catalog.len()),
    }

    println!("\n🔍 Matching...");
    let project_name = Path::new(materials_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("project");
    let engine = EstimationEngine::new();
    let run = engine.run_for_document(project_name, &document, payload.materials, catalog, None);

    print_run(&run);

    println!("\n💾 Saving run {}...", run.run_id);
    db::insert_run(&conn, &run)?;
    println!("✓ Saved");

    Ok(())
}

fn print_run(run: &EstimationRun) {
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("💰 Estimate: {}", run.estimate.summary());

    for total in &run.estimate.category_totals {
        println!(
            "   {:<24} ${:>10.2}  ({} line(s))",
            total.category, total.total_cost, total.line_count
        );
    }

    if !run.estimate.unmatched.is_empty() {
        println!("\n📋 Needs manual quotation:");
        for item in &run.estimate.unmatched {
            println!("   - {} ({} {})", item.item_name, item.quantity, item.unit);
        }
    }

    if !run.rejected.is_empty() {
        println!("\n⚠️  Rejected inputs:");
        for rejected in &run.rejected {
            println!(
                "   - {}: {}",
                rejected.material.item_name,
                rejected.reason.as_str()
            );
        }
    }

    println!("\n✅ Accuracy:");
    match run.accuracy.overall_accuracy {
        Some(accuracy) => {
            let level = run
                .accuracy
                .confidence_level
                .map(|l| l.as_str())
                .unwrap_or("unknown");
            println!("   Overall: {:.1}% ({})", accuracy, level);
            if let Some(interval) = &run.accuracy.confidence_interval {
                println!("   95% interval: [{:.1}%, {:.1}%]", interval.lower, interval.upper);
            }
        }
        None => println!("   Not applicable (no items scored)"),
    }
    for note in &run.accuracy.validation_notes {
        println!("   • {}", note);
    }
}

/// History mode: list stored runs
fn run_history(args: &[String]) -> Result<()> {
    let db_path = args.first().map(String::as_str).unwrap_or(DEFAULT_DB);

    let conn = Connection::open(db_path)?;
    db::setup_database(&conn)?;
    let runs = db::list_runs(&conn)?;

    if runs.is_empty() {
        println!("No stored runs in {}", db_path);
        return Ok(());
    }

    println!("📜 {} stored run(s):", runs.len());
    for run in runs {
        let accuracy = run
            .overall_accuracy
            .map(|a| format!("{:.1}%", a))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "   {}  {:<24} ${:>10.2}  accuracy {}",
            run.created_at, run.project_name, run.total_cost, accuracy
        );
    }

    Ok(())
}
