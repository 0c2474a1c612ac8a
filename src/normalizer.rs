// 🧹 Normalizer - Canonical keys for extracted materials
// Turns free-text category / dimension / description fields into a
// comparable key so the matcher and the catalog index probe the same space.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::extraction::ExtractedItem;

/// Bucket used when a dimension string is absent or unparsable
pub const UNSPECIFIED_BUCKET: &str = "unspecified";

/// Category used when the extracted category is absent or unrecognized
pub const DEFAULT_CATEGORY: &str = "uncategorized";

// ============================================================================
// CATEGORY ALIASES
// ============================================================================

/// Fixed alias table: canonical category → accepted spellings.
/// Both extracted items and catalog entries pass through this table, so an
/// item labeled "Rafters" and an entry labeled "Roofing" land in the same
/// bucket space.
const CATEGORY_ALIASES: &[(&str, &[&str])] = &[
    ("walls", &["walls", "wall", "wall framing", "framing walls"]),
    ("joist", &["joist", "joists", "floor joist", "floor joists"]),
    ("roof", &["roof", "roofing", "rafter", "rafters", "roof framing"]),
    (
        "cornice and decking",
        &["cornice and decking", "cornice", "decking", "deck"],
    ),
    (
        "post & beams",
        &[
            "post & beams",
            "post and beams",
            "posts and beams",
            "post & beam",
            "post and beam",
            "beams",
            "posts",
        ],
    ),
    ("electrical", &["electrical", "electric", "wiring"]),
    ("plumbing", &["plumbing"]),
    ("hvac", &["hvac", "heating", "ventilation", "air conditioning"]),
    (
        "structural",
        &["structural", "structure", "hardware", "fasteners"],
    ),
    ("finishes", &["finishes", "finish", "interior finishes", "trim"]),
    ("mechanical", &["mechanical"]),
];

/// Map a raw category label to its canonical form.
/// Unknown or missing labels degrade to `"uncategorized"`, never an error.
pub fn normalize_category(raw: Option<&str>) -> String {
    let label = match raw {
        Some(s) => s.trim().to_lowercase(),
        None => return DEFAULT_CATEGORY.to_string(),
    };

    if label.is_empty() {
        return DEFAULT_CATEGORY.to_string();
    }

    for (canonical, aliases) in CATEGORY_ALIASES {
        if aliases.iter().any(|a| *a == label) {
            return canonical.to_string();
        }
    }

    DEFAULT_CATEGORY.to_string()
}

// ============================================================================
// DIMENSION BUCKETING
// ============================================================================

/// Parse a lumber dimension string into a canonical bucket.
///
/// Accepts the notations that show up in takeoffs and price lists:
/// `2x4x8`, `2X4X104-5/8`, `2"x4"x8'`, `1-3/4X11-7/8X16`, `7/16X4X8`.
/// Unit markers (quotes, `in`, `ft`) and whitespace are tolerated.
/// Anything unparsable maps to `"unspecified"` so lookups stay well-formed.
pub fn bucket_dimension(raw: Option<&str>) -> String {
    let text = match raw {
        Some(s) => s.trim().to_lowercase().replace('×', "x"),
        None => return UNSPECIFIED_BUCKET.to_string(),
    };

    if text.is_empty() {
        return UNSPECIFIED_BUCKET.to_string();
    }

    let parts: Vec<&str> = text.split('x').collect();
    if parts.is_empty() || parts.len() > 4 {
        return UNSPECIFIED_BUCKET.to_string();
    }

    let mut components = Vec::with_capacity(parts.len());
    for part in &parts {
        match parse_component(part) {
            Some(value) if value > 0.0 => components.push(value),
            _ => return UNSPECIFIED_BUCKET.to_string(),
        }
    }

    components
        .iter()
        .map(|c| format_component(*c))
        .collect::<Vec<_>>()
        .join("x")
}

/// Parse one dimension component: `8`, `8'`, `8 ft`, `104-5/8`, `7/16`, `1.75`
fn parse_component(raw: &str) -> Option<f64> {
    let mut text = raw.trim().to_string();

    // Strip unit markers from the tail (longest first so "in" doesn't
    // truncate "inches")
    for marker in ["inches", "inch", "feet", "foot", "in", "ft", "\"", "''", "'"] {
        if let Some(stripped) = text.strip_suffix(marker) {
            text = stripped.trim().to_string();
            break;
        }
    }

    if text.is_empty() {
        return None;
    }

    // Mixed number: "104-5/8"
    if let Some((whole, frac)) = text.split_once('-') {
        let whole: f64 = whole.trim().parse().ok()?;
        return Some(whole + parse_fraction(frac)?);
    }

    // Bare fraction: "7/16"
    if text.contains('/') {
        return parse_fraction(&text);
    }

    text.parse().ok()
}

fn parse_fraction(raw: &str) -> Option<f64> {
    let (numerator, denominator) = raw.split_once('/')?;
    let numerator: f64 = numerator.trim().parse().ok()?;
    let denominator: f64 = denominator.trim().parse().ok()?;
    if denominator == 0.0 {
        return None;
    }
    Some(numerator / denominator)
}

/// Format a component without trailing zeros: 8 → "8", 11.875 → "11.875"
fn format_component(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let mut text = format!("{:.4}", value);
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
        text
    }
}

// ============================================================================
// TOKENIZATION
// ============================================================================

/// Filler words that carry no signal for material matching
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "at", "by", "for", "in", "of", "on", "or", "per", "the", "to", "with", "x",
];

/// Lower-cased, punctuation-stripped tokens from a description.
/// Compound tokens like "2x4x8" survive because `x` is alphanumeric.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

// ============================================================================
// NORMALIZED KEY
// ============================================================================

/// Canonical form of one extracted material, used for index probes and
/// candidate scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedKey {
    /// Canonical category (alias-mapped, `"uncategorized"` fallback)
    pub category: String,

    /// Canonical dimension bucket (`"unspecified"` fallback)
    pub dimension_bucket: String,

    /// Description tokens, stop words removed
    pub tokens: BTreeSet<String>,
}

impl NormalizedKey {
    pub fn has_dimension(&self) -> bool {
        self.dimension_bucket != UNSPECIFIED_BUCKET
    }
}

/// Normalize one extracted item. Pure; parsing failures degrade to the
/// default category / unspecified bucket instead of raising.
pub fn normalize(item: &ExtractedItem) -> NormalizedKey {
    NormalizedKey {
        category: normalize_category(item.category.as_deref()),
        dimension_bucket: bucket_dimension(item.dimensions.as_deref()),
        tokens: tokenize(&item.item_name),
    }
}

// ============================================================================
// TESTS
// ============================================================================
