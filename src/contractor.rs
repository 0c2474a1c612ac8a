// 👷 Contractor Profiles + Catalog Import
// Price catalogs arrive as per-contractor CSV exports. Rows are grouped by
// contractor; a bad row is collected as an import error, never a reason to
// abandon the rest of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::catalog::CatalogEntry;

// ============================================================================
// CONTRACTOR PROFILE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorProfile {
    /// Stable identity (UUID)
    pub id: String,

    pub name: String,
    pub contact_number: String,
    pub address: String,
    pub email: String,

    /// "lumber", "electrical", ...
    pub specialty: String,
}

impl ContractorProfile {
    pub fn new(name: &str) -> Self {
        ContractorProfile {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            contact_number: String::new(),
            address: String::new(),
            email: String::new(),
            specialty: String::new(),
        }
    }
}

// ============================================================================
// CONTRACTOR REGISTRY
// ============================================================================

/// In-memory contractor roster for a session
pub struct ContractorRegistry {
    contractors: Vec<ContractorProfile>,
}

impl ContractorRegistry {
    pub fn new() -> Self {
        ContractorRegistry {
            contractors: Vec::new(),
        }
    }

    pub fn add(&mut self, contractor: ContractorProfile) -> String {
        let id = contractor.id.clone();
        self.contractors.push(contractor);
        id
    }

    /// Case-insensitive name lookup
    pub fn find_by_name(&self, name: &str) -> Option<&ContractorProfile> {
        let needle = name.to_lowercase();
        self.contractors
            .iter()
            .find(|c| c.name.to_lowercase() == needle)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&ContractorProfile> {
        self.contractors.iter().find(|c| c.id == id)
    }

    pub fn all(&self) -> &[ContractorProfile] {
        &self.contractors
    }

    pub fn count(&self) -> usize {
        self.contractors.len()
    }
}

impl Default for ContractorRegistry {
    fn default() -> Self {
        ContractorRegistry::new()
    }
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// One row of the contractor catalog export.
/// Expected columns:
/// contractor_name,contact_number,address,email,specialty,item_name,
/// display_name,category,subcategory,dimensions,material,grade,unit,price
#[derive(Debug, Deserialize)]
struct ImportRow {
    contractor_name: String,
    #[serde(default)]
    contact_number: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    specialty: String,
    item_name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    subcategory: String,
    #[serde(default)]
    dimensions: String,
    #[serde(default)]
    material: String,
    #[serde(default)]
    grade: String,
    #[serde(default = "default_unit")]
    unit: String,
    price: f64,
}

fn default_unit() -> String {
    "each".to_string()
}

/// Outcome counters for one import, mirrored back to the caller
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub contractors_added: usize,
    pub materials_added: usize,
    pub errors: Vec<String>,

    /// Materials per contractor, import order
    pub by_contractor: Vec<(String, usize)>,
}

/// A parsed catalog import: profiles, price entries, and the row-level
/// outcome report
#[derive(Debug)]
pub struct CatalogImport {
    pub contractors: Vec<ContractorProfile>,
    pub entries: Vec<CatalogEntry>,
    pub report: ImportReport,
}

/// Import a contractor catalog CSV file
pub fn import_catalog_csv(path: &Path) -> Result<CatalogImport> {
    let file = File::open(path).with_context(|| format!("Failed to open catalog CSV: {}", path.display()))?;
    import_catalog_reader(file)
}

/// Import from any reader (tests feed in-memory CSV through here)
pub fn import_catalog_reader<R: Read>(reader: R) -> Result<CatalogImport> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let mut contractors: Vec<ContractorProfile> = Vec::new();
    let mut entries = Vec::new();
    let mut report = ImportReport::default();

    for (line, record) in csv_reader.deserialize::<ImportRow>().enumerate() {
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                report.errors.push(format!("row {}: {}", line + 2, e));
                continue;
            }
        };

        if row.contractor_name.trim().is_empty() || row.item_name.trim().is_empty() {
            report
                .errors
                .push(format!("row {}: missing contractor or item name", line + 2));
            continue;
        }
        if row.price < 0.0 {
            report
                .errors
                .push(format!("row {}: negative price for {}", line + 2, row.item_name));
            continue;
        }

        let contractor_name = row.contractor_name.trim().to_string();
        let known = contractors
            .iter()
            .any(|c| c.name.to_lowercase() == contractor_name.to_lowercase());
        if !known {
            contractors.push(ContractorProfile {
                id: uuid::Uuid::new_v4().to_string(),
                name: contractor_name.clone(),
                contact_number: row.contact_number.trim().to_string(),
                address: row.address.trim().to_string(),
                email: row.email.trim().to_string(),
                specialty: row.specialty.trim().to_string(),
            });
            report.contractors_added += 1;
            report.by_contractor.push((contractor_name.clone(), 0));
        }

        entries.push(CatalogEntry {
            item_id: row.item_name.trim().to_string(),
            description: if row.display_name.trim().is_empty() {
                row.item_name.trim().to_string()
            } else {
                row.display_name.trim().to_string()
            },
            category: row.category.trim().to_string(),
            subcategory: row.subcategory.trim().to_string(),
            dimensions: row.dimensions.trim().to_string(),
            material: row.material.trim().to_string(),
            grade: row.grade.trim().to_string(),
            unit_price: row.price,
            unit: row.unit.trim().to_string(),
            in_stock: true,
            contractor: Some(contractor_name.clone()),
        });
        report.materials_added += 1;
        if let Some(counter) = report
            .by_contractor
            .iter_mut()
            .find(|(name, _)| *name == contractor_name)
        {
            counter.1 += 1;
        }
    }

    Ok(CatalogImport {
        contractors,
        entries,
        report,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
contractor_name,contact_number,address,email,specialty,item_name,display_name,category,subcategory,dimensions,material,grade,unit,price
Quality Hardware & Lumber,(555) 123-4567,123 Main St,sales@qhl.com,lumber,2X4_STUD_8,2x4 Stud 8ft,Walls,Studs,2X4X8,KD H-FIR,STD&BTR,each,5.71
Quality Hardware & Lumber,(555) 123-4567,123 Main St,sales@qhl.com,lumber,OSB_7/16X4X8,OSB Sheathing,Walls,Sheathing,7/16X4X8,OSB,STANDARD,sheet,9.70
Structural Lumber Co,(555) 321-9876,2468 Mill Rd,quotes@slc.com,lumber,2X12X20_KD,2x12x20 Joist,Joist,Dimensional Lumber,2X12X20,KD H-FIR,#2&BTR,lf,34.19
";

    #[test]
    fn test_import_groups_by_contractor() {
        let import = import_catalog_reader(SAMPLE_CSV.as_bytes()).unwrap();

        assert_eq!(import.report.contractors_added, 2);
        assert_eq!(import.report.materials_added, 3);
        assert!(import.report.errors.is_empty());
        assert_eq!(
            import.report.by_contractor,
            vec![
                ("Quality Hardware & Lumber".to_string(), 2),
                ("Structural Lumber Co".to_string(), 1)
            ]
        );

        assert_eq!(import.entries.len(), 3);
        assert_eq!(import.entries[0].unit_price, 5.71);
        assert_eq!(
            import.entries[0].contractor.as_deref(),
            Some("Quality Hardware & Lumber")
        );
    }

    #[test]
    fn test_import_collects_bad_rows() {
        let csv = "\
contractor_name,contact_number,address,email,specialty,item_name,display_name,category,subcategory,dimensions,material,grade,unit,price
Quality Hardware & Lumber,,,,lumber,2X4_STUD_8,,Walls,Studs,2X4X8,,,each,5.71
Quality Hardware & Lumber,,,,lumber,BAD_PRICE,,Walls,Studs,2X4X8,,,each,not-a-number
Quality Hardware & Lumber,,,,lumber,NEGATIVE,,Walls,Studs,2X4X8,,,each,-1.0
";
        let import = import_catalog_reader(csv.as_bytes()).unwrap();

        assert_eq!(import.report.materials_added, 1);
        assert_eq!(import.report.errors.len(), 2);
        assert!(import.report.errors[1].contains("NEGATIVE"));
    }

    #[test]
    fn test_display_name_falls_back_to_item_name() {
        let csv = "\
contractor_name,contact_number,address,email,specialty,item_name,display_name,category,subcategory,dimensions,material,grade,unit,price
Lumber Depot,,,,lumber,2X6X12_KD,,Walls,Studs,2X6X12,,,each,8.25
";
        let import = import_catalog_reader(csv.as_bytes()).unwrap();
        assert_eq!(import.entries[0].description, "2X6X12_KD");
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ContractorRegistry::new();
        let id = registry.add(ContractorProfile::new("Quality Hardware & Lumber"));

        assert_eq!(registry.count(), 1);
        assert!(registry.find_by_name("quality hardware & lumber").is_some());
        assert!(registry.find_by_id(&id).is_some());
        assert!(registry.find_by_name("Unknown Supply").is_none());
    }
}
