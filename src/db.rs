// 🗃️ Persistence - SQLite storage for catalogs and estimation runs
// The matching core never touches disk; this collaborator layer stores
// contractor price snapshots and completed runs so estimates survive the
// process. Runs are kept as JSON documents beside a few queryable columns.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;
use crate::contractor::ContractorProfile;
use crate::engine::EstimationRun;

// ============================================================================
// SCHEMA
// ============================================================================

/// Create tables and switch on WAL. Safe to call on every startup.
pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("Failed to enable WAL mode")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS contractors (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL UNIQUE,
            contact_number  TEXT NOT NULL DEFAULT '',
            address         TEXT NOT NULL DEFAULT '',
            email           TEXT NOT NULL DEFAULT '',
            specialty       TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS catalog_entries (
            contractor   TEXT NOT NULL DEFAULT '',
            item_id      TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT '',
            category     TEXT NOT NULL DEFAULT '',
            subcategory  TEXT NOT NULL DEFAULT '',
            dimensions   TEXT NOT NULL DEFAULT '',
            material     TEXT NOT NULL DEFAULT '',
            grade        TEXT NOT NULL DEFAULT '',
            unit_price   REAL NOT NULL,
            unit         TEXT NOT NULL DEFAULT 'each',
            in_stock     INTEGER NOT NULL DEFAULT 1,
            UNIQUE(contractor, item_id)
        );

        CREATE INDEX IF NOT EXISTS idx_catalog_contractor
            ON catalog_entries(contractor);

        CREATE TABLE IF NOT EXISTS estimation_runs (
            run_id            TEXT PRIMARY KEY,
            project_name      TEXT NOT NULL,
            document_hash     TEXT,
            created_at        TEXT NOT NULL,
            total_cost        REAL NOT NULL,
            overall_accuracy  REAL,
            run_json          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_runs_document
            ON estimation_runs(document_hash);",
    )
    .context("Failed to create schema")?;

    Ok(())
}

// ============================================================================
// CONTRACTORS
// ============================================================================

/// Insert contractors, skipping names already on file. Returns how many
/// rows were actually added.
pub fn insert_contractors(conn: &Connection, contractors: &[ContractorProfile]) -> Result<usize> {
    let mut added = 0;
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO contractors
         (id, name, contact_number, address, email, specialty)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;

    for c in contractors {
        added += stmt.execute(params![
            c.id,
            c.name,
            c.contact_number,
            c.address,
            c.email,
            c.specialty
        ])?;
    }

    Ok(added)
}

pub fn get_all_contractors(conn: &Connection) -> Result<Vec<ContractorProfile>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, contact_number, address, email, specialty
         FROM contractors ORDER BY name",
    )?;

    let contractors = stmt
        .query_map([], |row| {
            Ok(ContractorProfile {
                id: row.get(0)?,
                name: row.get(1)?,
                contact_number: row.get(2)?,
                address: row.get(3)?,
                email: row.get(4)?,
                specialty: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(contractors)
}

// ============================================================================
// CATALOG ENTRIES
// ============================================================================

/// Upsert a catalog snapshot. Re-importing the same export refreshes
/// prices instead of duplicating rows (keyed on contractor + item id).
pub fn insert_catalog_entries(conn: &Connection, entries: &[CatalogEntry]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR REPLACE INTO catalog_entries
         (contractor, item_id, description, category, subcategory,
          dimensions, material, grade, unit_price, unit, in_stock)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    for e in entries {
        stmt.execute(params![
            e.contractor.clone().unwrap_or_default(),
            e.item_id,
            e.description,
            e.category,
            e.subcategory,
            e.dimensions,
            e.material,
            e.grade,
            e.unit_price,
            e.unit,
            e.in_stock as i64,
        ])?;
    }

    Ok(entries.len())
}

/// Load a catalog snapshot, optionally restricted to one contractor.
/// Rows come back in storage order, which the index treats as catalog
/// insertion order for tie-breaking.
pub fn get_catalog(conn: &Connection, contractor: Option<&str>) -> Result<Vec<CatalogEntry>> {
    let sql = "SELECT contractor, item_id, description, category, subcategory,
                      dimensions, material, grade, unit_price, unit, in_stock
               FROM catalog_entries";

    let map_row = |row: &rusqlite::Row| -> rusqlite::Result<CatalogEntry> {
        let contractor: String = row.get(0)?;
        Ok(CatalogEntry {
            contractor: (!contractor.is_empty()).then_some(contractor),
            item_id: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            subcategory: row.get(4)?,
            dimensions: row.get(5)?,
            material: row.get(6)?,
            grade: row.get(7)?,
            unit_price: row.get(8)?,
            unit: row.get(9)?,
            in_stock: row.get::<_, i64>(10)? != 0,
        })
    };

    let entries = match contractor {
        Some(name) => {
            let mut stmt = conn.prepare(&format!("{} WHERE contractor = ?1 ORDER BY rowid", sql))?;
            let rows = stmt.query_map(params![name], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", sql))?;
            let rows = stmt.query_map([], map_row)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(entries)
}

pub fn catalog_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM catalog_entries", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// ESTIMATION RUNS
// ============================================================================

/// One row of the run history listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub project_name: String,
    pub created_at: String,
    pub total_cost: f64,
    pub overall_accuracy: Option<f64>,
}

/// Persist a completed run. The full report rides along as JSON.
pub fn insert_run(conn: &Connection, run: &EstimationRun) -> Result<()> {
    let run_json = serde_json::to_string(run).context("Failed to serialize estimation run")?;

    conn.execute(
        "INSERT INTO estimation_runs
         (run_id, project_name, document_hash, created_at, total_cost,
          overall_accuracy, run_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            run.run_id,
            run.project_name,
            run.document_hash,
            run.created_at.to_rfc3339(),
            run.estimate.total_cost,
            run.accuracy.overall_accuracy,
            run_json,
        ],
    )
    .context("Failed to insert estimation run")?;

    Ok(())
}

pub fn get_run(conn: &Connection, run_id: &str) -> Result<Option<EstimationRun>> {
    let run_json: Option<String> = conn
        .query_row(
            "SELECT run_json FROM estimation_runs WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .optional()?;

    match run_json {
        Some(json) => {
            let run = serde_json::from_str(&json).context("Failed to parse stored run")?;
            Ok(Some(run))
        }
        None => Ok(None),
    }
}

/// Most recent run for a source document, if the same drawing was
/// estimated before (fingerprint cache)
pub fn find_run_by_document(conn: &Connection, document_hash: &str) -> Result<Option<EstimationRun>> {
    let run_json: Option<String> = conn
        .query_row(
            "SELECT run_json FROM estimation_runs
             WHERE document_hash = ?1
             ORDER BY created_at DESC LIMIT 1",
            params![document_hash],
            |row| row.get(0),
        )
        .optional()?;

    match run_json {
        Some(json) => {
            let run = serde_json::from_str(&json).context("Failed to parse stored run")?;
            Ok(Some(run))
        }
        None => Ok(None),
    }
}

pub fn list_runs(conn: &Connection) -> Result<Vec<RunSummary>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, project_name, created_at, total_cost, overall_accuracy
         FROM estimation_runs ORDER BY created_at DESC",
    )?;

    let runs = stmt
        .query_map([], |row| {
            Ok(RunSummary {
                run_id: row.get(0)?,
                project_name: row.get(1)?,
                created_at: row.get(2)?,
                total_cost: row.get(3)?,
                overall_accuracy: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(runs)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EstimationEngine;
    use crate::extraction::RawMaterial;

    fn test_entry(item_id: &str, price: f64) -> CatalogEntry {
        CatalogEntry {
            item_id: item_id.to_string(),
            description: "2X4X8 KD H-FIR STUD".to_string(),
            category: "Walls".to_string(),
            subcategory: "Studs".to_string(),
            dimensions: "2X4X8".to_string(),
            material: "KD H-FIR".to_string(),
            grade: "STD&BTR".to_string(),
            unit_price: price,
            unit: "each".to_string(),
            in_stock: true,
            contractor: Some("Quality Hardware & Lumber".to_string()),
        }
    }

    #[test]
    fn test_catalog_roundtrip() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_catalog_entries(&conn, &[test_entry("2X4_STUD_8", 5.71), test_entry("2X6X12_KD", 8.25)])
            .unwrap();

        assert_eq!(catalog_count(&conn).unwrap(), 2);

        let all = get_catalog(&conn, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].item_id, "2X4_STUD_8");
        assert_eq!(all[0].contractor.as_deref(), Some("Quality Hardware & Lumber"));

        let none = get_catalog(&conn, Some("Unknown Supply")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_reimport_refreshes_prices() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        insert_catalog_entries(&conn, &[test_entry("2X4_STUD_8", 5.71)]).unwrap();
        // Same item id, new price: replaced, not duplicated
        insert_catalog_entries(&conn, &[test_entry("2X4_STUD_8", 6.05)]).unwrap();

        assert_eq!(catalog_count(&conn).unwrap(), 1);
        let all = get_catalog(&conn, None).unwrap();
        assert_eq!(all[0].unit_price, 6.05);
    }

    #[test]
    fn test_contractor_insert_is_idempotent_by_name() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let first = ContractorProfile::new("Quality Hardware & Lumber");
        let second = ContractorProfile::new("Quality Hardware & Lumber");

        assert_eq!(insert_contractors(&conn, &[first]).unwrap(), 1);
        assert_eq!(insert_contractors(&conn, &[second]).unwrap(), 0);
        assert_eq!(get_all_contractors(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_run_roundtrip_and_document_cache() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let engine = EstimationEngine::new();
        let run = engine.run_for_document(
            "Garage Project",
            b"drawing rev A",
            vec![RawMaterial {
                item_name: "2x4x8 kd stud".to_string(),
                category: Some("Walls".to_string()),
                dimensions: Some("2x4x8".to_string()),
                quantity: Some(10.0),
                unit: "each".to_string(),
                location: None,
            }],
            vec![test_entry("2X4_STUD_8", 5.0)],
            None,
        );

        insert_run(&conn, &run).unwrap();

        let loaded = get_run(&conn, &run.run_id).unwrap().unwrap();
        assert_eq!(loaded.estimate.total_cost, 50.0);
        assert_eq!(loaded.run_id, run.run_id);

        let cached = find_run_by_document(&conn, run.document_hash.as_ref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(cached.run_id, run.run_id);

        assert!(find_run_by_document(&conn, "no-such-hash").unwrap().is_none());

        let summaries = list_runs(&conn).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].project_name, "Garage Project");
        assert_eq!(summaries[0].total_cost, 50.0);
    }

    #[test]
    fn test_get_missing_run() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        assert!(get_run(&conn, "missing").unwrap().is_none());
    }
}
