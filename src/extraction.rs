// 📄 Extraction Intake - Materials from the document-analysis step
// The upstream analyzer returns a JSON list of candidate materials. This
// module deserializes that payload, screens each record for field-level
// well-formedness, and fingerprints the source document for run caching.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// RAW MATERIAL (as delivered by the analyzer)
// ============================================================================

/// One candidate material exactly as the analyzer produced it.
/// Esta es la representación "cruda" antes de validar: every field the
/// upstream model may omit or garble is optional here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaterial {
    /// Free-text name/description of the material
    #[serde(default)]
    pub item_name: String,

    /// Category label (may be absent or noisy)
    #[serde(default)]
    pub category: Option<String>,

    /// Dimension string such as "2x4x8" (may be absent)
    #[serde(default)]
    pub dimensions: Option<String>,

    /// Quantity detected on the document
    #[serde(default)]
    pub quantity: Option<f64>,

    /// Unit of measure ("each", "lf", "sheet", ...)
    #[serde(default = "default_unit")]
    pub unit: String,

    /// Where on the document the material was seen
    #[serde(default)]
    pub location: Option<String>,
}

fn default_unit() -> String {
    "each".to_string()
}

/// Analyzer payload wrapper: `{"materials": [...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialsPayload {
    #[serde(default)]
    pub materials: Vec<RawMaterial>,
}

impl MaterialsPayload {
    /// Parse an analyzer response body
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse materials payload")
    }
}

// ============================================================================
// EXTRACTED ITEM (validated)
// ============================================================================

/// One well-formed extracted material, ready for matching.
/// Immutable once produced; owned by the matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub item_name: String,
    pub category: Option<String>,
    pub dimensions: Option<String>,
    /// Always finite and >= 0 (screened at ingestion)
    pub quantity: f64,
    pub unit: String,
    pub location: Option<String>,
}

// ============================================================================
// INGESTION SCREENING
// ============================================================================

/// Why a raw material was excluded from matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingDescription,
    MissingQuantity,
    NegativeQuantity,
    NonFiniteQuantity,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingDescription => "missing description",
            RejectReason::MissingQuantity => "missing quantity",
            RejectReason::NegativeQuantity => "negative quantity",
            RejectReason::NonFiniteQuantity => "non-finite quantity",
        }
    }
}

/// A raw material that failed field-level validation.
/// Reported to the caller instead of being silently dropped or estimated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedMaterial {
    pub material: RawMaterial,
    pub reason: RejectReason,
}

/// Screen raw materials into validated items + rejected entries.
/// Nothing here is fatal: every record ends up in exactly one of the two
/// output lists.
pub fn screen_materials(raw: Vec<RawMaterial>) -> (Vec<ExtractedItem>, Vec<RejectedMaterial>) {
    let mut items = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for material in raw {
        match screen_one(&material) {
            Ok(item) => items.push(item),
            Err(reason) => rejected.push(RejectedMaterial { material, reason }),
        }
    }

    (items, rejected)
}

fn screen_one(material: &RawMaterial) -> std::result::Result<ExtractedItem, RejectReason> {
    if material.item_name.trim().is_empty() {
        return Err(RejectReason::MissingDescription);
    }

    let quantity = material.quantity.ok_or(RejectReason::MissingQuantity)?;
    if !quantity.is_finite() {
        return Err(RejectReason::NonFiniteQuantity);
    }
    if quantity < 0.0 {
        return Err(RejectReason::NegativeQuantity);
    }

    Ok(ExtractedItem {
        item_name: material.item_name.trim().to_string(),
        category: material.category.clone().filter(|c| !c.trim().is_empty()),
        dimensions: material.dimensions.clone().filter(|d| !d.trim().is_empty()),
        quantity,
        unit: if material.unit.trim().is_empty() {
            default_unit()
        } else {
            material.unit.trim().to_string()
        },
        location: material.location.clone(),
    })
}

// ============================================================================
// DOCUMENT FINGERPRINT
// ============================================================================

/// SHA-256 fingerprint of the source document bytes.
/// Used as a cache/idempotency key when persisting analysis runs, so the
/// same drawing uploaded twice maps to the same stored analysis.
pub fn document_fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, quantity: Option<f64>) -> RawMaterial {
        RawMaterial {
            item_name: name.to_string(),
            category: Some("Walls".to_string()),
            dimensions: Some("2x4x8".to_string()),
            quantity,
            unit: "each".to_string(),
            location: None,
        }
    }

    #[test]
    fn test_payload_parsing() {
        let json = r#"{
            "materials": [
                {"item_name": "2x4 Stud 8ft", "category": "Walls",
                 "dimensions": "2x4x8", "quantity": 120, "unit": "each"},
                {"item_name": "OSB Sheathing 4x8", "quantity": 40, "unit": "sheet"}
            ]
        }"#;

        let payload = MaterialsPayload::from_json(json).unwrap();
        assert_eq!(payload.materials.len(), 2);
        assert_eq!(payload.materials[0].quantity, Some(120.0));
        // Missing fields default instead of failing the whole payload
        assert_eq!(payload.materials[1].category, None);
        assert_eq!(payload.materials[1].unit, "sheet");
    }

    #[test]
    fn test_screen_accepts_well_formed() {
        let (items, rejected) = screen_materials(vec![raw("2x4 Stud 8ft", Some(10.0))]);
        assert_eq!(items.len(), 1);
        assert!(rejected.is_empty());
        assert_eq!(items[0].quantity, 10.0);
    }

    #[test]
    fn test_screen_rejects_missing_quantity() {
        let (items, rejected) = screen_materials(vec![raw("2x4 Stud 8ft", None)]);
        assert!(items.is_empty());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].reason, RejectReason::MissingQuantity);
    }

    #[test]
    fn test_screen_rejects_negative_quantity() {
        let (_, rejected) = screen_materials(vec![raw("2x4 Stud 8ft", Some(-5.0))]);
        assert_eq!(rejected[0].reason, RejectReason::NegativeQuantity);
    }

    #[test]
    fn test_screen_rejects_non_finite_quantity() {
        let (_, rejected) = screen_materials(vec![raw("2x4 Stud 8ft", Some(f64::NAN))]);
        assert_eq!(rejected[0].reason, RejectReason::NonFiniteQuantity);
    }

    #[test]
    fn test_screen_rejects_blank_description() {
        let (_, rejected) = screen_materials(vec![raw("   ", Some(3.0))]);
        assert_eq!(rejected[0].reason, RejectReason::MissingDescription);
    }

    #[test]
    fn test_screen_zero_quantity_is_valid() {
        // Zero is a legitimate detected quantity, not a rejection
        let (items, rejected) = screen_materials(vec![raw("Flashing", Some(0.0))]);
        assert_eq!(items.len(), 1);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = document_fingerprint(b"floor plan rev A");
        let b = document_fingerprint(b"floor plan rev A");
        let c = document_fingerprint(b"floor plan rev B");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
