// 🔍 Match Engine - Extracted materials vs. catalog candidates
// For each extracted item: probe the catalog index, score every candidate
// with a weighted similarity, pick a winner deterministically, and assign a
// confidence tier. Items that match nothing acceptable stay in the output
// as unmatched instead of failing the run.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::catalog::{CatalogEntry, CatalogIndex, IndexedEntry};
use crate::extraction::ExtractedItem;
use crate::normalizer::{normalize, NormalizedKey};

// ============================================================================
// CONFIDENCE TIER
// ============================================================================

/// Discrete confidence bucket assigned to a match.
/// Each tier carries a fixed weight consumed by the accuracy scorer;
/// tiers are assigned here and never changed afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    /// The item's category exists in the catalog but nothing acceptable
    /// matched
    NonCatalog,
    /// Nothing in the catalog speaks for this item at all
    None,
}

impl ConfidenceTier {
    /// Fixed scoring weight for the accuracy formula
    pub fn weight(&self) -> f64 {
        match self {
            ConfidenceTier::High => 0.9,
            ConfidenceTier::Medium => 0.7,
            ConfidenceTier::Low => 0.5,
            ConfidenceTier::NonCatalog => 0.3,
            ConfidenceTier::None => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "high",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::Low => "low",
            ConfidenceTier::NonCatalog => "non_catalog",
            ConfidenceTier::None => "none",
        }
    }

    /// Matched tiers contribute a line cost; the other two mean
    /// "needs manual quotation"
    pub fn is_matched(&self) -> bool {
        matches!(
            self,
            ConfidenceTier::High | ConfidenceTier::Medium | ConfidenceTier::Low
        )
    }
}

// ============================================================================
// MATCH POLICY
// ============================================================================

/// All scoring weights and tier thresholds in one place.
/// Tests assert the exact boundaries; swapping the policy never touches
/// matching control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPolicy {
    /// Weight of an exact dimension-bucket match (largest component)
    pub dimension_weight: f64,

    /// Weight of a category match (medium component)
    pub category_weight: f64,

    /// Weight of the token-set Jaccard overlap (smaller, continuous)
    pub token_weight: f64,

    /// Winning score at or above this is a high-confidence match
    pub high_threshold: f64,

    /// ... medium-confidence match
    pub medium_threshold: f64,

    /// Below this the winner is discarded and the item stays unmatched
    pub low_threshold: f64,
}

impl MatchPolicy {
    pub fn new() -> Self {
        MatchPolicy {
            dimension_weight: 0.45,
            category_weight: 0.30,
            token_weight: 0.25,
            high_threshold: 0.85,
            medium_threshold: 0.60,
            low_threshold: 0.35,
        }
    }

    /// Map a winning similarity score to its confidence tier
    pub fn tier_for_score(&self, score: f64) -> ConfidenceTier {
        if score >= self.high_threshold {
            ConfidenceTier::High
        } else if score >= self.medium_threshold {
            ConfidenceTier::Medium
        } else if score >= self.low_threshold {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::NonCatalog
        }
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        MatchPolicy::new()
    }
}

// ============================================================================
// UNIT COMPATIBILITY
// ============================================================================

/// Interchangeable unit spellings. Units from different groups never match;
/// units the table has not seen match only on exact equality.
const UNIT_GROUPS: &[&[&str]] = &[
    &["each", "ea", "pc", "pcs", "piece", "pieces", "unit", "units"],
    &["lf", "ft", "feet", "foot", "linear feet", "linear foot", "lin ft"],
    &["sf", "sqft", "sq ft", "square feet", "square foot"],
    &["sheet", "sheets", "sht", "panel", "panels"],
    &["roll", "rolls"],
    &["pack", "packs", "pkg", "box", "boxes"],
    &["square", "squares"],
    &["lb", "lbs", "pound", "pounds"],
    &["gal", "gallon", "gallons"],
];

/// Hard gate: incompatible units eliminate a candidate regardless of score.
/// A missing unit on either side does not gate (the analyzer often omits it).
pub fn units_compatible(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a.is_empty() || b.is_empty() || a == b {
        return true;
    }

    let group_of = |unit: &str| UNIT_GROUPS.iter().position(|g| g.contains(&unit));

    match (group_of(&a), group_of(&b)) {
        (Some(ga), Some(gb)) => ga == gb,
        _ => false,
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

/// One extracted item paired with its best catalog entry, or with none.
/// `entry` is always drawn from the index the result was produced against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub item: ExtractedItem,

    /// Normalized key the probes used
    pub key: NormalizedKey,

    /// Winning catalog entry; None for unmatched items
    pub entry: Option<CatalogEntry>,

    pub tier: ConfidenceTier,

    /// Winning similarity score (0.0 for unmatched items). Recorded so a
    /// continuous score-to-weight mapping could replace the fixed tiers
    /// without re-running matches.
    pub score: f64,
}

impl MatchResult {
    pub fn is_matched(&self) -> bool {
        self.entry.is_some()
    }

    /// Quantity carried into the estimate; always the extracted quantity
    pub fn matched_quantity(&self) -> f64 {
        self.item.quantity
    }

    /// quantity × unit price, present only for matched items
    pub fn line_cost(&self) -> Option<f64> {
        self.entry
            .as_ref()
            .map(|entry| entry.unit_price * self.item.quantity)
    }
}

// ============================================================================
// SIMILARITY SCORING
// ============================================================================

/// |A ∩ B| / |A ∪ B| over description tokens
pub(crate) fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Weighted similarity between a normalized item and one candidate.
///
/// Plain weighted sum: exact dimension-bucket agreement carries the largest
/// weight, category agreement a medium weight, token overlap a smaller
/// continuous weight. An item without a parseable dimension can never
/// collect the dimension weight, so dimensionless matches cap at the low
/// tier; confidence in a priced line requires dimensional confirmation.
fn score_candidate(key: &NormalizedKey, candidate: &IndexedEntry, policy: &MatchPolicy) -> f64 {
    let mut score = 0.0;

    if key.has_dimension() && candidate.dimension_bucket == key.dimension_bucket {
        score += policy.dimension_weight;
    }

    if candidate.category == key.category {
        score += policy.category_weight;
    }

    score += policy.token_weight * jaccard(&key.tokens, &candidate.tokens);

    score
}

// ============================================================================
// MATCH ENGINE
// ============================================================================

pub struct MatchEngine {
    pub policy: MatchPolicy,
}

impl MatchEngine {
    pub fn new() -> Self {
        MatchEngine {
            policy: MatchPolicy::new(),
        }
    }

    pub fn with_policy(policy: MatchPolicy) -> Self {
        MatchEngine { policy }
    }

    /// Match one extracted item against the catalog index.
    ///
    /// Probe order: (category, dimension-bucket) first, then the
    /// category's unspecified bucket before declaring no candidates.
    pub fn match_item(&self, item: &ExtractedItem, index: &CatalogIndex) -> MatchResult {
        let key = normalize(item);

        let mut candidates = index.lookup(&key.category, &key.dimension_bucket);
        if candidates.is_empty() && key.has_dimension() {
            candidates = index.lookup_unspecified(&key.category);
        }

        if candidates.is_empty() {
            let tier = if index.has_category(&key.category) {
                ConfidenceTier::NonCatalog
            } else {
                ConfidenceTier::None
            };
            return MatchResult {
                item: item.clone(),
                key,
                entry: None,
                tier,
                score: 0.0,
            };
        }

        // Unit gate, then best-score selection. Ties prefer the cheaper
        // candidate, then catalog insertion order.
        let mut best: Option<(&IndexedEntry, f64)> = None;
        for candidate in candidates {
            if !units_compatible(&item.unit, &candidate.entry.unit) {
                continue;
            }

            let score = score_candidate(&key, candidate, &self.policy);
            best = match best {
                None => Some((candidate, score)),
                Some((current, current_score)) => {
                    let better = score > current_score
                        || (score == current_score
                            && candidate.entry.unit_price < current.entry.unit_price);
                    if better {
                        Some((candidate, score))
                    } else {
                        Some((current, current_score))
                    }
                }
            };
        }

        match best {
            // Candidates existed but none survived the unit gate
            None => MatchResult {
                item: item.clone(),
                key,
                entry: None,
                tier: ConfidenceTier::None,
                score: 0.0,
            },
            Some((winner, score)) => {
                let tier = self.policy.tier_for_score(score);
                if tier.is_matched() {
                    MatchResult {
                        item: item.clone(),
                        key,
                        entry: Some(winner.entry.clone()),
                        tier,
                        score,
                    }
                } else {
                    // Winner scored below the low threshold: the item stays
                    // unmatched, but the category was represented
                    MatchResult {
                        item: item.clone(),
                        key,
                        entry: None,
                        tier: ConfidenceTier::NonCatalog,
                        score,
                    }
                }
            }
        }
    }

    /// Match every item, preserving input order.
    ///
    /// Per-item matching has no cross-item dependency and the index is
    /// read-only after build, so items fan out across the rayon pool.
    pub fn match_all(&self, items: &[ExtractedItem], index: &CatalogIndex) -> Vec<MatchResult> {
        items
            .par_iter()
            .map(|item| self.match_item(item, index))
            .collect()
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        MatchEngine::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    fn entry(
        item_id: &str,
        description: &str,
        category: &str,
        dimensions: &str,
        unit_price: f64,
        unit: &str,
    ) -> CatalogEntry {
        CatalogEntry {
            item_id: item_id.to_string(),
            description: description.to_string(),
            category: category.to_string(),
            subcategory: "Studs".to_string(),
            dimensions: dimensions.to_string(),
            material: "KD H-FIR".to_string(),
            grade: "STD&BTR".to_string(),
            unit_price,
            unit: unit.to_string(),
            in_stock: true,
            contractor: None,
        }
    }

    fn item(name: &str, category: Option<&str>, dimensions: Option<&str>, unit: &str) -> ExtractedItem {
        ExtractedItem {
            item_name: name.to_string(),
            category: category.map(|c| c.to_string()),
            dimensions: dimensions.map(|d| d.to_string()),
            quantity: 10.0,
            unit: unit.to_string(),
            location: None,
        }
    }

    #[test]
    fn test_policy_boundaries() {
        let policy = MatchPolicy::new();
        assert_eq!(policy.tier_for_score(0.85), ConfidenceTier::High);
        assert_eq!(policy.tier_for_score(0.849), ConfidenceTier::Medium);
        assert_eq!(policy.tier_for_score(0.60), ConfidenceTier::Medium);
        assert_eq!(policy.tier_for_score(0.599), ConfidenceTier::Low);
        assert_eq!(policy.tier_for_score(0.35), ConfidenceTier::Low);
        assert_eq!(policy.tier_for_score(0.349), ConfidenceTier::NonCatalog);
    }

    #[test]
    fn test_tier_weights() {
        assert_eq!(ConfidenceTier::High.weight(), 0.9);
        assert_eq!(ConfidenceTier::Medium.weight(), 0.7);
        assert_eq!(ConfidenceTier::Low.weight(), 0.5);
        assert_eq!(ConfidenceTier::NonCatalog.weight(), 0.3);
        assert_eq!(ConfidenceTier::None.weight(), 0.0);
    }

    #[test]
    fn test_unit_gate() {
        assert!(units_compatible("each", "EA"));
        assert!(units_compatible("lf", "feet"));
        assert!(units_compatible("sheet", "panel"));
        assert!(!units_compatible("each", "lf"));
        assert!(!units_compatible("sheet", "roll"));
        // Missing unit never gates
        assert!(units_compatible("", "each"));
        // Unknown units only match themselves
        assert!(units_compatible("bd ft", "bd ft"));
        assert!(!units_compatible("bd ft", "lf"));
    }

    #[test]
    fn test_exact_match_is_high_tier() {
        // Worked example: one catalog entry, same category and dimension
        let index = CatalogIndex::build(vec![entry(
            "S1", "2X4X8 STUD", "Walls", "2x4x8", 5.00, "each",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(&item("2x4x8 stud", Some("Walls"), Some("2x4x8"), "each"), &index);

        assert_eq!(result.tier, ConfidenceTier::High);
        assert!(result.is_matched());
        assert_eq!(result.entry.as_ref().unwrap().item_id, "S1");
        assert_eq!(result.line_cost(), Some(50.0));
        assert_eq!(result.matched_quantity(), 10.0);
    }

    #[test]
    fn test_unknown_category_is_none() {
        let index = CatalogIndex::build(vec![entry(
            "S1", "2X4X8 STUD", "Walls", "2x4x8", 5.00, "each",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(
            &item("Unknown Material", Some("Plumbing"), None, "each"),
            &index,
        );

        assert_eq!(result.tier, ConfidenceTier::None);
        assert!(!result.is_matched());
        assert_eq!(result.line_cost(), None);
    }

    #[test]
    fn test_unit_gate_eliminates_all_candidates() {
        let index = CatalogIndex::build(vec![entry(
            "S1", "2X4X8 STUD", "Walls", "2x4x8", 5.00, "lf",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(&item("2x4x8 stud", Some("Walls"), Some("2x4x8"), "sheet"), &index);

        assert_eq!(result.tier, ConfidenceTier::None);
        assert!(!result.is_matched());
    }

    #[test]
    fn test_tie_break_prefers_lowest_price() {
        let index = CatalogIndex::build(vec![
            entry("EXP", "2X4X8 STUD", "Walls", "2x4x8", 6.50, "each"),
            entry("CHEAP", "2X4X8 STUD", "Walls", "2x4x8", 4.95, "each"),
        ]);
        let engine = MatchEngine::new();

        let result = engine.match_item(&item("2x4x8 stud", Some("Walls"), Some("2x4x8"), "each"), &index);

        assert_eq!(result.entry.as_ref().unwrap().item_id, "CHEAP");
    }

    #[test]
    fn test_tie_break_falls_back_to_insertion_order() {
        // Identical descriptions and prices: the earlier catalog row wins
        let index = CatalogIndex::build(vec![
            entry("FIRST", "2X4X8 STUD", "Walls", "2x4x8", 5.00, "each"),
            entry("SECOND", "2X4X8 STUD", "Walls", "2x4x8", 5.00, "each"),
        ]);
        let engine = MatchEngine::new();

        let result = engine.match_item(&item("2x4x8 stud", Some("Walls"), Some("2x4x8"), "each"), &index);

        assert_eq!(result.entry.as_ref().unwrap().item_id, "FIRST");
    }

    #[test]
    fn test_relaxed_probe_when_bucket_empty() {
        // No 2x6x10 bucket; the category's unspecified bucket is retried
        let index = CatalogIndex::build(vec![entry(
            "GEN", "WALL PANEL KIT", "Walls", "CUSTOM", 80.0, "each",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(
            &item("wall panel kit", Some("Walls"), Some("2x6x10"), "each"),
            &index,
        );

        // Dimension wanted but absent on the candidate: capped well below
        // high, matchable on tokens + category alone
        assert!(result.is_matched());
        assert_eq!(result.tier, ConfidenceTier::Low);
        assert_eq!(result.entry.as_ref().unwrap().item_id, "GEN");
    }

    #[test]
    fn test_dimensionless_item_caps_at_low() {
        // Perfect token overlap, but no dimension to confirm against:
        // the match lands, at low confidence
        let index = CatalogIndex::build(vec![entry(
            "SH", "ROOF SHINGLES ASPHALT", "Roof", "STANDARD", 45.0, "square",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(
            &item("asphalt roof shingles", Some("Roof"), None, "square"),
            &index,
        );

        assert!(result.is_matched());
        assert_eq!(result.tier, ConfidenceTier::Low);
        assert!((result.score - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_high_boundary_needs_token_agreement() {
        // Exact dimension + category contribute 0.75; Jaccard 0.4 lands
        // exactly on the 0.85 high boundary
        let index = CatalogIndex::build(vec![entry(
            "P1", "KD FIR PLATE HEADER", "Walls", "2x4x12", 5.71, "each",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(&item("kd fir stud", Some("Walls"), Some("2x4x12"), "each"), &index);

        assert!((result.score - 0.85).abs() < 1e-9);
        assert_eq!(result.tier, ConfidenceTier::High);
    }

    #[test]
    fn test_weak_winner_degrades_to_non_catalog() {
        // Category is represented but the only candidate shares nothing
        // beyond it
        let index = CatalogIndex::build(vec![entry(
            "W1", "ZIP TAPE 30 YD", "Walls", "30 YD", 31.54, "roll",
        )]);
        let engine = MatchEngine::new();

        let result = engine.match_item(&item("window flashing kit", Some("Walls"), None, "roll"), &index);

        assert_eq!(result.tier, ConfidenceTier::NonCatalog);
        assert!(!result.is_matched());
        assert!(result.score < engine.policy.low_threshold);
    }

    #[test]
    fn test_empty_catalog_degrades_every_item() {
        let index = CatalogIndex::build(Vec::new());
        let engine = MatchEngine::new();

        let results = engine.match_all(
            &[
                item("2x4x8 stud", Some("Walls"), Some("2x4x8"), "each"),
                item("osb sheathing", Some("Walls"), None, "sheet"),
            ],
            &index,
        );

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.tier == ConfidenceTier::None));
    }

    #[test]
    fn test_match_all_preserves_order_and_is_deterministic() {
        let catalog = vec![
            entry("S1", "2X4X8 KD H-FIR STUD", "Walls", "2x4x8", 5.71, "each"),
            entry("S2", "2X6X12 KD H-FIR", "Walls", "2x6x12", 8.25, "each"),
            entry("J1", "2X8X12 JOIST", "Joist", "2x8x12", 16.52, "lf"),
        ];
        let index = CatalogIndex::build(catalog);
        let engine = MatchEngine::new();

        let items = vec![
            item("2x4x8 kd stud", Some("Walls"), Some("2x4x8"), "each"),
            item("joist 2x8x12", Some("Joist"), Some("2x8x12"), "lf"),
            item("mystery", Some("Electrical"), None, "each"),
        ];

        let first = engine.match_all(&items, &index);
        let second = engine.match_all(&items, &index);

        assert_eq!(first, second);
        assert_eq!(first[0].item.item_name, "2x4x8 kd stud");
        assert_eq!(first[1].item.item_name, "joist 2x8x12");
        assert_eq!(first[2].tier, ConfidenceTier::None);
    }

    #[test]
    fn test_jaccard() {
        let a: std::collections::BTreeSet<String> =
            ["stud", "kd", "fir"].iter().map(|s| s.to_string()).collect();
        let b: std::collections::BTreeSet<String> =
            ["stud", "kd", "osb"].iter().map(|s| s.to_string()).collect();
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-9);
        assert_eq!(jaccard(&a, &a), 1.0);
    }
}
