// 🏗️ Estimation Engine - One matching run, end to end
// validate → index → match (parallel) → aggregate + score.
// The engine is stateless across runs: every run gets its own item list and
// its own catalog index, so concurrent runs over different contractor
// snapshots cannot interfere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accuracy::{AccuracyReport, AccuracyScorer, ValidationInput};
use crate::catalog::{CatalogEntry, CatalogIndex};
use crate::estimate::{aggregate, EstimationResult};
use crate::extraction::{screen_materials, RawMaterial, RejectedMaterial};
use crate::matcher::{MatchEngine, MatchPolicy, MatchResult};

// ============================================================================
// ESTIMATION RUN
// ============================================================================

/// Everything one run produced, ready for persistence or transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationRun {
    /// Stable run identity (UUID)
    pub run_id: String,

    pub project_name: String,

    /// SHA-256 of the source document, when the caller supplied one
    pub document_hash: Option<String>,

    pub created_at: DateTime<Utc>,

    pub estimate: EstimationResult,
    pub accuracy: AccuracyReport,

    /// Per-item match detail (inputs to the two reports above)
    pub results: Vec<MatchResult>,

    /// Raw materials excluded at ingestion, surfaced to the caller
    pub rejected: Vec<RejectedMaterial>,
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct EstimationEngine {
    matcher: MatchEngine,
    scorer: AccuracyScorer,
}

impl EstimationEngine {
    pub fn new() -> Self {
        EstimationEngine {
            matcher: MatchEngine::new(),
            scorer: AccuracyScorer::new(),
        }
    }

    pub fn with_policy(policy: MatchPolicy) -> Self {
        EstimationEngine {
            matcher: MatchEngine::with_policy(policy),
            scorer: AccuracyScorer::new(),
        }
    }

    /// Run a full estimation: screen the analyzer's materials, build the
    /// catalog index, match every item, then derive the cost estimate and
    /// the accuracy report off the same match list.
    ///
    /// Never fails: malformed inputs become `rejected` entries and an empty
    /// catalog degrades every item to unmatched.
    pub fn run(
        &self,
        project_name: &str,
        materials: Vec<RawMaterial>,
        catalog: Vec<CatalogEntry>,
        validation: Option<&ValidationInput>,
    ) -> EstimationRun {
        let (items, rejected) = screen_materials(materials);
        let index = CatalogIndex::build(catalog);

        let results = self.matcher.match_all(&items, &index);

        let estimate = aggregate(&results);
        let accuracy = self.scorer.score(&results, validation);

        EstimationRun {
            run_id: uuid::Uuid::new_v4().to_string(),
            project_name: project_name.to_string(),
            document_hash: None,
            created_at: Utc::now(),
            estimate,
            accuracy,
            results,
            rejected,
        }
    }

    /// Same as `run`, tagging the result with the source document's
    /// fingerprint so repeated uploads of the same drawing are linkable
    pub fn run_for_document(
        &self,
        project_name: &str,
        document_bytes: &[u8],
        materials: Vec<RawMaterial>,
        catalog: Vec<CatalogEntry>,
        validation: Option<&ValidationInput>,
    ) -> EstimationRun {
        let mut run = self.run(project_name, materials, catalog, validation);
        run.document_hash = Some(crate::extraction::document_fingerprint(document_bytes));
        run
    }
}

impl Default for EstimationEngine {
    fn default() -> Self {
        EstimationEngine::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accuracy::ConfidenceLevel;
    use crate::matcher::ConfidenceTier;

    fn stud_catalog() -> Vec<CatalogEntry> {
        vec![CatalogEntry {
            item_id: "2X4_STUD_8".to_string(),
            description: "2X4X8 KD H-FIR STUD".to_string(),
            category: "Walls".to_string(),
            subcategory: "Studs".to_string(),
            dimensions: "2X4X8".to_string(),
            material: "KD H-FIR".to_string(),
            grade: "STD&BTR".to_string(),
            unit_price: 5.0,
            unit: "each".to_string(),
            in_stock: true,
            contractor: Some("Quality Hardware & Lumber".to_string()),
        }]
    }

    fn stud_material(quantity: Option<f64>) -> RawMaterial {
        RawMaterial {
            item_name: "2x4x8 kd stud".to_string(),
            category: Some("Walls".to_string()),
            dimensions: Some("2x4x8".to_string()),
            quantity,
            unit: "each".to_string(),
            location: Some("Sheet A-1".to_string()),
        }
    }

    #[test]
    fn test_full_run() {
        let engine = EstimationEngine::new();
        let run = engine.run("Test Project", vec![stud_material(Some(10.0))], stud_catalog(), None);

        assert_eq!(run.project_name, "Test Project");
        assert!(!run.run_id.is_empty());
        assert_eq!(run.estimate.total_cost, 50.0);
        assert_eq!(run.results[0].tier, ConfidenceTier::High);
        assert_eq!(run.accuracy.overall_accuracy, Some(90.0));
        assert_eq!(run.accuracy.confidence_level, Some(ConfidenceLevel::High));
        assert!(run.rejected.is_empty());
    }

    #[test]
    fn test_rejected_inputs_surface_without_failing_run() {
        let engine = EstimationEngine::new();
        let run = engine.run(
            "Test Project",
            vec![stud_material(Some(10.0)), stud_material(None)],
            stud_catalog(),
            None,
        );

        // The malformed record is excluded from matching and reported,
        // never silently estimated
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.rejected.len(), 1);
        assert_eq!(run.estimate.total_cost, 50.0);
    }

    #[test]
    fn test_empty_catalog_run_still_reports() {
        let engine = EstimationEngine::new();
        let run = engine.run("Test Project", vec![stud_material(Some(10.0))], Vec::new(), None);

        assert_eq!(run.estimate.total_cost, 0.0);
        assert_eq!(run.estimate.unmatched_count, 1);
        assert_eq!(run.accuracy.overall_accuracy, Some(0.0));
    }

    #[test]
    fn test_document_fingerprint_attached() {
        let engine = EstimationEngine::new();
        let run = engine.run_for_document(
            "Test Project",
            b"drawing bytes",
            vec![stud_material(Some(10.0))],
            stud_catalog(),
            None,
        );

        assert_eq!(run.document_hash.as_ref().unwrap().len(), 64);
    }

    #[test]
    fn test_run_serializes() {
        let engine = EstimationEngine::new();
        let run = engine.run("Test Project", vec![stud_material(Some(10.0))], stud_catalog(), None);

        let json = serde_json::to_string(&run).unwrap();
        let parsed: EstimationRun = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.estimate.total_cost, 50.0);
        assert_eq!(parsed.results.len(), 1);
    }
}
