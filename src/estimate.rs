// 💰 Cost Aggregator - Matched lines into a project estimate
// Pure reduction over the match results: line costs, category totals, and
// the manual-quotation list. Runs after all per-item matches have joined.

use serde::{Deserialize, Serialize};

use crate::matcher::{ConfidenceTier, MatchResult};

// ============================================================================
// LINE ITEMS
// ============================================================================

/// One priced estimate line (a matched item)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateLine {
    /// Extracted description the line was priced from
    pub item_name: String,

    /// Catalog item the price came from
    pub catalog_item_id: String,
    pub catalog_description: String,

    /// Category as labeled in the catalog (the authority for cost breakdowns)
    pub category: String,

    pub contractor: Option<String>,

    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,

    /// quantity × unit_price
    pub line_cost: f64,

    pub tier: ConfidenceTier,
}

/// An extracted item with no acceptable catalog counterpart.
/// Excluded from every total; priced by hand instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedItem {
    pub item_name: String,
    pub category: Option<String>,
    pub dimensions: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub tier: ConfidenceTier,
    pub needs_manual_quotation: bool,
}

/// Cost subtotal for one catalog category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_cost: f64,
    pub line_count: usize,
}

// ============================================================================
// ESTIMATION RESULT
// ============================================================================

/// Aggregate output of one matching run.
/// Produced once, never mutated by the engine afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// Sum of all line costs; always equals the sum of category totals
    pub total_cost: f64,

    /// Category subtotals in first-encounter order
    pub category_totals: Vec<CategoryTotal>,

    pub lines: Vec<EstimateLine>,

    /// Items requiring manual quotation (tier none / non_catalog)
    pub unmatched: Vec<UnmatchedItem>,

    pub matched_count: usize,
    pub unmatched_count: usize,
}

impl EstimationResult {
    pub fn summary(&self) -> String {
        format!(
            "{} lines priced at ${:.2}, {} item(s) need manual quotation",
            self.matched_count, self.total_cost, self.unmatched_count
        )
    }

    /// Completeness of pricing coverage, 0-100
    pub fn coverage_percent(&self) -> f64 {
        let total = self.matched_count + self.unmatched_count;
        if total == 0 {
            return 0.0;
        }
        (self.matched_count as f64 / total as f64) * 100.0
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Fold match results into an estimation result.
///
/// Deterministic: same input sequence, same output, every run. Lines keep
/// input order; categories appear in the order first encountered; summation
/// is plain left-to-right.
pub fn aggregate(results: &[MatchResult]) -> EstimationResult {
    let mut lines = Vec::new();
    let mut unmatched = Vec::new();
    let mut category_totals: Vec<CategoryTotal> = Vec::new();
    let mut total_cost = 0.0;

    for result in results {
        match &result.entry {
            Some(entry) => {
                let line_cost = entry.unit_price * result.matched_quantity();
                total_cost += line_cost;

                match category_totals
                    .iter()
                    .position(|t| t.category == entry.category)
                {
                    Some(pos) => {
                        category_totals[pos].total_cost += line_cost;
                        category_totals[pos].line_count += 1;
                    }
                    None => category_totals.push(CategoryTotal {
                        category: entry.category.clone(),
                        total_cost: line_cost,
                        line_count: 1,
                    }),
                }

                lines.push(EstimateLine {
                    item_name: result.item.item_name.clone(),
                    catalog_item_id: entry.item_id.clone(),
                    catalog_description: entry.description.clone(),
                    category: entry.category.clone(),
                    contractor: entry.contractor.clone(),
                    quantity: result.matched_quantity(),
                    unit: entry.unit.clone(),
                    unit_price: entry.unit_price,
                    line_cost,
                    tier: result.tier,
                });
            }
            None => unmatched.push(UnmatchedItem {
                item_name: result.item.item_name.clone(),
                category: result.item.category.clone(),
                dimensions: result.item.dimensions.clone(),
                quantity: result.item.quantity,
                unit: result.item.unit.clone(),
                tier: result.tier,
                needs_manual_quotation: true,
            }),
        }
    }

    let matched_count = lines.len();
    let unmatched_count = unmatched.len();

    EstimationResult {
        total_cost,
        category_totals,
        lines,
        unmatched,
        matched_count,
        unmatched_count,
    }
}

// ============================================================================
// TESTS
// ============================================================================
