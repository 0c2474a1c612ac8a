// ✅ Accuracy Scorer - Confidence-weighted accuracy for an estimate
// Converts per-item confidence tiers (and ground-truth corrections, when a
// reconciliation pass supplies them) into an overall accuracy percentage, a
// qualitative level, a 95% confidence interval, and per-category breakdowns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matcher::{ConfidenceTier, MatchResult};
use crate::normalizer::normalize_category;

// ============================================================================
// CONFIDENCE LEVEL
// ============================================================================

/// Qualitative band for an overall accuracy percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    VeryHigh, // 95-100
    High,     // 85-94
    Medium,   // 70-84
    Low,      // 50-69
    VeryLow,  // below 50
}

impl ConfidenceLevel {
    pub fn from_accuracy(percent: f64) -> Self {
        if percent >= 95.0 {
            ConfidenceLevel::VeryHigh
        } else if percent >= 85.0 {
            ConfidenceLevel::High
        } else if percent >= 70.0 {
            ConfidenceLevel::Medium
        } else if percent >= 50.0 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::VeryHigh => "very_high",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::VeryLow => "very_low",
        }
    }
}

// ============================================================================
// VALIDATION INPUT (ground truth)
// ============================================================================

/// Post-hoc actuals for one category, observed after purchasing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryActuals {
    pub category: String,
    pub actual_quantity: Option<f64>,
    pub actual_price: Option<f64>,
}

/// Ground-truth corrections supplied by an external reconciliation workflow.
/// When present, accuracy folds in quantity and pricing components; when
/// absent, accuracy is confidence-tier-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationInput {
    pub categories: Vec<CategoryActuals>,
}

// ============================================================================
// ACCURACY REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Accuracy for one item category (canonical label)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAccuracy {
    pub category: String,
    pub accuracy: f64,
    pub item_count: usize,
}

/// Derived deterministically from the match results of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// 0-100; None when the run had zero scoreable items
    pub overall_accuracy: Option<f64>,

    pub confidence_level: Option<ConfidenceLevel>,

    /// 95% interval under a normal approximation, clamped to [0, 100].
    /// Collapses to the point estimate when only one item was scored.
    pub confidence_interval: Option<ConfidenceInterval>,

    /// Per-category accuracy in first-encounter order
    pub category_accuracy: Vec<CategoryAccuracy>,

    /// 0-100, present only when ground-truth quantities were supplied
    pub quantity_accuracy: Option<f64>,

    /// 0-100, present only when ground-truth prices were supplied
    pub pricing_accuracy: Option<f64>,

    pub total_items: usize,
    pub matched_items: usize,
    pub unmatched_items: usize,
    pub high_confidence_items: usize,
    pub medium_confidence_items: usize,
    pub low_confidence_items: usize,

    /// Deterministic rule-based observations for the reviewer
    pub validation_notes: Vec<String>,

    pub analyzed_at: DateTime<Utc>,
}

// ============================================================================
// ACCURACY SCORER
// ============================================================================

pub struct AccuracyScorer {
    /// Relative weight of the confidence-tier component when ground truth
    /// is present (components renormalize over whichever are available)
    pub confidence_weight: f64,
    pub quantity_weight: f64,
    pub pricing_weight: f64,

    /// z value for the 95% interval
    pub interval_z: f64,

    /// Below this overall accuracy the report recommends manual review
    pub review_threshold: f64,
}

impl AccuracyScorer {
    pub fn new() -> Self {
        AccuracyScorer {
            confidence_weight: 0.4,
            quantity_weight: 0.3,
            pricing_weight: 0.3,
            interval_z: 1.96,
            review_threshold: 70.0,
        }
    }

    /// Score one run's match results.
    pub fn score(&self, results: &[MatchResult], validation: Option<&ValidationInput>) -> AccuracyReport {
        let total_items = results.len();

        let mut high = 0;
        let mut medium = 0;
        let mut low = 0;
        let mut unmatched = 0;
        for result in results {
            match result.tier {
                ConfidenceTier::High => high += 1,
                ConfidenceTier::Medium => medium += 1,
                ConfidenceTier::Low => low += 1,
                ConfidenceTier::NonCatalog | ConfidenceTier::None => unmatched += 1,
            }
        }
        let matched = high + medium + low;

        // Degenerate run: nothing to score, report that explicitly instead
        // of dividing by zero
        if total_items == 0 {
            return AccuracyReport {
                overall_accuracy: None,
                confidence_level: None,
                confidence_interval: None,
                category_accuracy: Vec::new(),
                quantity_accuracy: None,
                pricing_accuracy: None,
                total_items: 0,
                matched_items: 0,
                unmatched_items: 0,
                high_confidence_items: 0,
                medium_confidence_items: 0,
                low_confidence_items: 0,
                validation_notes: vec!["no extracted items to score; accuracy not applicable".to_string()],
                analyzed_at: Utc::now(),
            };
        }

        let weights: Vec<f64> = results.iter().map(|r| r.tier.weight()).collect();
        let confidence_accuracy = percent(mean(&weights));

        // Ground-truth components, per category then averaged
        let (quantity_accuracy, pricing_accuracy) = match validation {
            Some(input) => self.ground_truth_components(results, input),
            None => (None, None),
        };

        let overall = self.fold_components(confidence_accuracy, quantity_accuracy, pricing_accuracy);
        let confidence_level = ConfidenceLevel::from_accuracy(overall);
        let confidence_interval = self.interval(overall, &weights);
        let category_accuracy = category_breakdown(results);

        let mut validation_notes = Vec::new();
        if unmatched > 0 {
            validation_notes.push(format!("{} item(s) require manual quotation", unmatched));
        }
        if overall < self.review_threshold {
            validation_notes.push("low confidence: manual review recommended".to_string());
        }
        if quantity_accuracy.is_some() || pricing_accuracy.is_some() {
            validation_notes.push("ground truth applied: accuracy includes quantity and pricing components".to_string());
        }

        AccuracyReport {
            overall_accuracy: Some(overall),
            confidence_level: Some(confidence_level),
            confidence_interval,
            category_accuracy,
            quantity_accuracy,
            pricing_accuracy,
            total_items,
            matched_items: matched,
            unmatched_items: unmatched,
            high_confidence_items: high,
            medium_confidence_items: medium,
            low_confidence_items: low,
            validation_notes,
            analyzed_at: Utc::now(),
        }
    }

    /// Fold available components with fixed relative weights
    /// (confidence 40%, quantity 30%, pricing 30%), renormalized over the
    /// components that are actually present.
    fn fold_components(&self, confidence: f64, quantity: Option<f64>, pricing: Option<f64>) -> f64 {
        let mut weighted = self.confidence_weight * confidence;
        let mut weight_sum = self.confidence_weight;

        if let Some(q) = quantity {
            weighted += self.quantity_weight * q;
            weight_sum += self.quantity_weight;
        }
        if let Some(p) = pricing {
            weighted += self.pricing_weight * p;
            weight_sum += self.pricing_weight;
        }

        clamp_percent(weighted / weight_sum)
    }

    /// Per-category `1 − |estimated − actual| / actual`, floored at 0,
    /// averaged over the categories that supplied each kind of actual.
    fn ground_truth_components(
        &self,
        results: &[MatchResult],
        input: &ValidationInput,
    ) -> (Option<f64>, Option<f64>) {
        let mut quantity_scores = Vec::new();
        let mut pricing_scores = Vec::new();

        for actuals in &input.categories {
            let category = normalize_category(Some(&actuals.category));

            let estimated_quantity: f64 = results
                .iter()
                .filter(|r| r.is_matched() && r.key.category == category)
                .map(|r| r.matched_quantity())
                .sum();
            let estimated_price: f64 = results
                .iter()
                .filter(|r| r.key.category == category)
                .filter_map(|r| r.line_cost())
                .sum();

            if let Some(actual) = actuals.actual_quantity {
                if actual > 0.0 {
                    quantity_scores.push(relative_accuracy(estimated_quantity, actual));
                }
            }
            if let Some(actual) = actuals.actual_price {
                if actual > 0.0 {
                    pricing_scores.push(relative_accuracy(estimated_price, actual));
                }
            }
        }

        let quantity = (!quantity_scores.is_empty()).then(|| percent(mean(&quantity_scores)));
        let pricing = (!pricing_scores.is_empty()).then(|| percent(mean(&pricing_scores)));
        (quantity, pricing)
    }

    /// `overall ± z · s/√n` with the sample standard deviation of the
    /// per-item tier weights
    fn interval(&self, overall: f64, weights: &[f64]) -> Option<ConfidenceInterval> {
        let n = weights.len();
        if n == 0 {
            return None;
        }
        if n == 1 {
            return Some(ConfidenceInterval {
                lower: overall,
                upper: overall,
            });
        }

        let mean_weight = mean(weights);
        let variance = weights
            .iter()
            .map(|w| (w - mean_weight).powi(2))
            .sum::<f64>()
            / (n as f64 - 1.0);
        let stddev_percent = variance.sqrt() * 100.0;
        let margin = self.interval_z * stddev_percent / (n as f64).sqrt();

        Some(ConfidenceInterval {
            lower: clamp_percent(overall - margin),
            upper: clamp_percent(overall + margin),
        })
    }
}

impl Default for AccuracyScorer {
    fn default() -> Self {
        AccuracyScorer::new()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn percent(fraction: f64) -> f64 {
    clamp_percent(fraction * 100.0)
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

/// `1 − |estimated − actual| / actual`, floored at 0
fn relative_accuracy(estimated: f64, actual: f64) -> f64 {
    (1.0 - (estimated - actual).abs() / actual).max(0.0)
}

/// Tier-weight accuracy restricted to each canonical category,
/// first-encounter order
fn category_breakdown(results: &[MatchResult]) -> Vec<CategoryAccuracy> {
    let mut breakdown: Vec<(String, Vec<f64>)> = Vec::new();

    for result in results {
        let category = &result.key.category;
        match breakdown.iter().position(|(c, _)| c == category) {
            Some(pos) => breakdown[pos].1.push(result.tier.weight()),
            None => breakdown.push((category.clone(), vec![result.tier.weight()])),
        }
    }

    breakdown
        .into_iter()
        .map(|(category, weights)| CategoryAccuracy {
            accuracy: percent(mean(&weights)),
            item_count: weights.len(),
            category,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
