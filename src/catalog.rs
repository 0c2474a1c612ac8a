// 🗄️ Catalog Snapshot + Index - Per-contractor price catalog lookup
// The catalog arrives as a read-only snapshot for the duration of a run.
// The index groups entries by (category, dimension-bucket) using the same
// bucketing as the normalizer, so per-item lookups touch one bucket instead
// of the whole catalog.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::normalizer::{bucket_dimension, normalize_category, tokenize, UNSPECIFIED_BUCKET};

// ============================================================================
// CATALOG ENTRY
// ============================================================================

/// One priced, contractor-specific material.
/// Immutable snapshot value; owned by the index for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable item code within the contractor's price list
    pub item_id: String,

    /// Display description ("2X4X8 KD H-FIR STUD")
    pub description: String,

    /// Category as labeled in the price list ("Walls", "Joist", ...)
    pub category: String,

    /// Subcategory ("Studs", "LVL Beams", "Sheathing", ...)
    pub subcategory: String,

    /// Dimension string as printed in the price list
    pub dimensions: String,

    /// Material ("KD H-FIR", "LVL", "OSB", ...)
    pub material: String,

    /// Grade ("STD&BTR", "2.0BTR", ...)
    pub grade: String,

    /// Price per unit, >= 0
    pub unit_price: f64,

    /// Unit of sale ("each", "lf", "sheet", ...)
    pub unit: String,

    /// Availability flag from the price list snapshot
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,

    /// Contractor this price belongs to
    #[serde(default)]
    pub contractor: Option<String>,
}

fn default_in_stock() -> bool {
    true
}

// ============================================================================
// INDEXED ENTRY
// ============================================================================

/// Catalog entry plus the derived fields the matcher scores against.
/// Tokens and bucket are computed once at build time, not per lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub entry: CatalogEntry,

    /// Canonical category (alias-mapped)
    pub category: String,

    /// Canonical dimension bucket
    pub dimension_bucket: String,

    /// Description tokens for overlap scoring
    pub tokens: BTreeSet<String>,

    /// Position in the source catalog; the deterministic tie-break of
    /// last resort
    pub order: usize,
}

// ============================================================================
// CATALOG INDEX
// ============================================================================

/// Read-only lookup structure built once per matching run.
///
/// Every source entry appears in exactly one (category, bucket) bucket.
/// Never mutated after `build()`, which is what makes concurrent lookups
/// safe without locking.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    buckets: HashMap<(String, String), Vec<IndexedEntry>>,
    categories: HashSet<String>,
    entry_count: usize,
}

impl CatalogIndex {
    /// Build the index from a catalog snapshot. O(catalog size).
    pub fn build(catalog: Vec<CatalogEntry>) -> Self {
        let mut buckets: HashMap<(String, String), Vec<IndexedEntry>> = HashMap::new();
        let mut categories = HashSet::new();
        let entry_count = catalog.len();

        for (order, entry) in catalog.into_iter().enumerate() {
            let category = normalize_category(Some(&entry.category));
            let dimension_bucket = bucket_dimension(Some(&entry.dimensions));
            let tokens = tokenize(&entry.description);

            categories.insert(category.clone());
            buckets
                .entry((category.clone(), dimension_bucket.clone()))
                .or_default()
                .push(IndexedEntry {
                    entry,
                    category,
                    dimension_bucket,
                    tokens,
                    order,
                });
        }

        CatalogIndex {
            buckets,
            categories,
            entry_count,
        }
    }

    /// Candidates for one (category, bucket) probe. O(bucket size).
    /// Returns an empty slice, never an error, when no bucket exists.
    pub fn lookup(&self, category: &str, dimension_bucket: &str) -> &[IndexedEntry] {
        self.buckets
            .get(&(category.to_string(), dimension_bucket.to_string()))
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Candidates with no parsed dimension, used as the relaxed retry probe
    pub fn lookup_unspecified(&self, category: &str) -> &[IndexedEntry] {
        self.lookup(category, UNSPECIFIED_BUCKET)
    }

    /// Whether any entry in the catalog carries this canonical category
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.contains(category)
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================
