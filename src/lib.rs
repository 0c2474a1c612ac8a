// Lumber Estimator - Core Library
// Material matching and accuracy scoring for construction cost estimates.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod extraction;
pub mod normalizer;
pub mod catalog;
pub mod matcher;
pub mod estimate;
pub mod accuracy;
pub mod engine;
pub mod contractor;
pub mod db;

// Re-export commonly used types
pub use extraction::{
    document_fingerprint, screen_materials, ExtractedItem, MaterialsPayload, RawMaterial,
    RejectReason, RejectedMaterial,
};
pub use normalizer::{
    bucket_dimension, normalize, normalize_category, tokenize, NormalizedKey, DEFAULT_CATEGORY,
    UNSPECIFIED_BUCKET,
};
pub use catalog::{CatalogEntry, CatalogIndex, IndexedEntry};
pub use matcher::{units_compatible, ConfidenceTier, MatchEngine, MatchPolicy, MatchResult};
pub use estimate::{
    aggregate, CategoryTotal, EstimateLine, EstimationResult, UnmatchedItem,
};
pub use accuracy::{
    AccuracyReport, AccuracyScorer, CategoryAccuracy, CategoryActuals, ConfidenceInterval,
    ConfidenceLevel, ValidationInput,
};
pub use engine::{EstimationEngine, EstimationRun};
pub use contractor::{
    import_catalog_csv, import_catalog_reader, CatalogImport, ContractorProfile,
    ContractorRegistry, ImportReport,
};
pub use db::{
    catalog_count, find_run_by_document, get_all_contractors, get_catalog, get_run,
    insert_catalog_entries, insert_contractors, insert_run, list_runs, setup_database, RunSummary,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
