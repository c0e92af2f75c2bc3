//! # Bulk Import Planner
//!
//! Decides, per spreadsheet row, whether it becomes a new entry, a variant of
//! an entry, or a duplicate to report.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RawRow ──normalize──▶ ImportRow   (bad numbers → defaults,            │
//! │                           │          empty name → RowError)            │
//! │                           ▼                                             │
//! │  group by first two words of name, lowercased, in order of appearance  │
//! │                           │                                             │
//! │            ┌──────────────┴──────────────┐                              │
//! │   existing entry with the same key?      │ no                           │
//! │            │ yes                         ▼                              │
//! │            ▼                    first non-duplicate row = new entry     │
//! │   every row = variant append    remaining rows = its variants           │
//! │                                                                         │
//! │  Before accepting ANY row:                                              │
//! │    row has a 5-digit code?  compare code only                           │
//! │    otherwise                compare trimmed lowercase name              │
//! │  against every existing entry + variant AND every row accepted so far   │
//! │    hit → DuplicateRecord, batch continues                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The planner is pure: it sees a snapshot of the owner's catalog and returns
//! an [`ImportPlan`]. Storing the plan (and journaling it) is the caller's job.
//!
//! ## Grouping caveat
//! The two-word key is a heuristic, not an identity: "Oil Filter 5W" and
//! "Oil Filter Housing" are grouped, "Front Brake Pad" and "Brake Pad Rear"
//! are not.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::{Markup, Money};
use crate::spreadsheet::RawRow;
use crate::types::{Category, Product, ProductDraft};
use crate::validation::is_short_code;
use crate::{GROUP_KEY_WORDS, MAX_ALLOCATED_CODE_DIGITS};

// =============================================================================
// Inputs
// =============================================================================

/// Request-level defaults applied to every row.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportDefaults {
    pub stock: i64,
    pub markup: Markup,
    pub currency: String,
    pub visible: bool,
    /// Category for rows that carry no category label.
    pub target_category_id: Option<String>,
}

/// A row after numeric coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRow {
    pub row_number: usize,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub base_price: Money,
    pub stock: i64,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub markup: Markup,
}

impl ImportRow {
    /// Coerces a raw row.
    ///
    /// Malformed price falls back to 0, malformed stock and markup to the
    /// request defaults; negative price and stock are clamped to 0. Only a
    /// missing name is an error.
    pub fn normalize(raw: RawRow, defaults: &ImportDefaults) -> Result<ImportRow, RowError> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(RowError {
                row_number: raw.row_number,
                name: None,
                message: "name is empty".to_string(),
            });
        }

        let base_price = raw
            .price
            .as_deref()
            .and_then(Money::parse_decimal)
            .filter(|m| !m.is_negative())
            .unwrap_or_default();

        let stock = raw
            .stock
            .as_deref()
            .and_then(parse_quantity)
            .unwrap_or(defaults.stock)
            .max(0);

        let markup = raw
            .markup
            .as_deref()
            .and_then(Markup::parse_percent)
            .unwrap_or(defaults.markup);

        Ok(ImportRow {
            row_number: raw.row_number,
            name,
            code: raw.code,
            catalog_number: raw.catalog_number,
            base_price,
            stock,
            category: raw.category,
            barcode: raw.barcode,
            markup,
        })
    }
}

/// Whole units from a cell like `"12"`, `"12.0"` or `"3,7"` (fraction dropped).
pub fn parse_quantity(cell: &str) -> Option<i64> {
    cell.trim()
        .parse::<i64>()
        .ok()
        .or_else(|| Money::parse_decimal(cell).map(|m| m.cents() / 100))
}

/// The grouping key: first two words of the name, lowercased.
///
/// ## Example
/// ```rust
/// use stockroom_core::import::group_key;
///
/// assert_eq!(group_key("Brake Pad Front"), "brake pad");
/// assert_eq!(group_key("  BRAKE   pad rear"), "brake pad");
/// assert_eq!(group_key("Gasket"), "gasket");
/// ```
pub fn group_key(name: &str) -> String {
    name.split_whitespace()
        .take(GROUP_KEY_WORDS)
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// =============================================================================
// Outputs
// =============================================================================

/// A row dropped because it collides with an existing entry/variant or an
/// earlier row of the same batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateRecord {
    pub row_number: usize,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub price: Money,
    pub stock: i64,
    /// `"code"` or `"name"`.
    pub matched_on: String,
    pub existing_id: String,
    pub existing_name: String,
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_number: usize,
    pub name: Option<String>,
    pub message: String,
}

/// A new entry with its bundled variants.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedEntry {
    pub id: String,
    pub draft: ProductDraft,
    pub variants: Vec<(String, ProductDraft)>,
}

/// Variants to append to an entry that already exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAppend {
    pub product_id: String,
    pub product_name: String,
    pub variants: Vec<(String, ProductDraft)>,
}

/// What an import batch will do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportPlan {
    pub entries: Vec<PlannedEntry>,
    pub appends: Vec<PlannedAppend>,
    pub duplicates: Vec<DuplicateRecord>,
    pub errors: Vec<RowError>,
}

impl ImportPlan {
    /// Variants bundled with new entries plus variants appended to old ones.
    pub fn total_variants(&self) -> usize {
        self.entries.iter().map(|e| e.variants.len()).sum::<usize>() + self.appended_variants()
    }

    /// Variants appended to entries that existed before the batch.
    pub fn appended_variants(&self) -> usize {
        self.appends.iter().map(|a| a.variants.len()).sum()
    }
}

// =============================================================================
// Duplicate Index
// =============================================================================

#[derive(Debug, Clone)]
struct Holder {
    id: String,
    name: String,
}

/// Codes and names already taken, by the catalog or by rows accepted
/// earlier in the batch.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    by_code: HashMap<String, Holder>,
    by_name: HashMap<String, Holder>,
}

impl DuplicateIndex {
    /// Indexes every entry and every variant of the catalog.
    pub fn from_catalog(catalog: &[Product]) -> Self {
        let mut index = DuplicateIndex::default();
        for product in catalog {
            index.insert(&product.id, &product.name, product.code.as_deref());
            for variant in &product.variants {
                index.insert(&product.id, &variant.name, variant.code.as_deref());
            }
        }
        index
    }

    /// Records a name/code as taken. First holder wins.
    pub fn insert(&mut self, owner_id: &str, name: &str, code: Option<&str>) {
        let holder = Holder {
            id: owner_id.to_string(),
            name: name.trim().to_string(),
        };
        if let Some(code) = code.map(str::trim).filter(|c| !c.is_empty()) {
            self.by_code
                .entry(code.to_string())
                .or_insert_with(|| holder.clone());
        }
        self.by_name.entry(name_key(name)).or_insert(holder);
    }

    /// Finds the record a name/code collides with.
    ///
    /// Returns `(matched_on, holder_id, holder_name)`.
    pub fn find(&self, name: &str, code: Option<&str>) -> Option<(&'static str, &str, &str)> {
        match code.map(str::trim).filter(|c| is_short_code(c)) {
            Some(code) => self
                .by_code
                .get(code)
                .map(|h| ("code", h.id.as_str(), h.name.as_str())),
            None => self
                .by_name
                .get(&name_key(name))
                .map(|h| ("name", h.id.as_str(), h.name.as_str())),
        }
    }
}

// =============================================================================
// Code Allocator
// =============================================================================

/// Hands out sequential short codes above the highest numeric code in use.
///
/// Only all-digit codes of at most [`MAX_ALLOCATED_CODE_DIGITS`] digits take
/// part, so a stray 20-digit code cannot push the sequence out of range.
#[derive(Debug, Clone)]
pub struct CodeAllocator {
    next: u64,
}

/// Largest code the allocator hands out (`999_999_999`).
const MAX_ALLOCATED_CODE: u64 = 10u64.pow(MAX_ALLOCATED_CODE_DIGITS as u32) - 1;

impl CodeAllocator {
    /// Starts above every allocatable all-digit code among `codes`.
    pub fn above<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let max = codes
            .into_iter()
            .map(str::trim)
            .filter(|c| {
                !c.is_empty()
                    && c.len() <= MAX_ALLOCATED_CODE_DIGITS
                    && c.bytes().all(|b| b.is_ascii_digit())
            })
            .filter_map(|c| c.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        CodeAllocator { next: max + 1 }
    }

    /// Starts above every numeric code of the catalog.
    pub fn for_catalog(catalog: &[Product]) -> Self {
        CodeAllocator::above(catalog_codes(catalog))
    }

    /// Next code, zero-padded to five digits.
    pub fn allocate(&mut self) -> CoreResult<String> {
        if self.next > MAX_ALLOCATED_CODE {
            return Err(CoreError::CodesExhausted);
        }
        let code = format!("{:05}", self.next);
        self.next = self.next.checked_add(1).ok_or(CoreError::CodesExhausted)?;
        Ok(code)
    }
}

fn catalog_codes(catalog: &[Product]) -> impl Iterator<Item = &str> {
    catalog.iter().flat_map(|p| {
        p.code
            .as_deref()
            .into_iter()
            .chain(p.variants.iter().filter_map(|v| v.code.as_deref()))
    })
}

// =============================================================================
// Planner
// =============================================================================

/// Plans an import batch against a snapshot of the owner's catalog.
pub struct ImportPlanner<'a> {
    catalog: &'a [Product],
    categories: &'a [Category],
    defaults: &'a ImportDefaults,
}

impl<'a> ImportPlanner<'a> {
    pub fn new(
        catalog: &'a [Product],
        categories: &'a [Category],
        defaults: &'a ImportDefaults,
    ) -> Self {
        ImportPlanner {
            catalog,
            categories,
            defaults,
        }
    }

    /// Builds the plan. Never fails: row problems land in the plan.
    pub fn plan(&self, raw_rows: Vec<RawRow>) -> ImportPlan {
        let mut plan = ImportPlan::default();

        let rows: Vec<ImportRow> = raw_rows
            .into_iter()
            .filter_map(|raw| match ImportRow::normalize(raw, self.defaults) {
                Ok(row) => Some(row),
                Err(err) => {
                    plan.errors.push(err);
                    None
                }
            })
            .collect();

        let mut index = DuplicateIndex::from_catalog(self.catalog);
        let mut codes = CodeAllocator::above(
            catalog_codes(self.catalog).chain(rows.iter().filter_map(|r| r.code.as_deref())),
        );

        for (key, group) in group_rows(rows) {
            let existing = self.catalog.iter().find(|p| group_key(&p.name) == key);

            match existing {
                Some(product) => {
                    let mut append = PlannedAppend {
                        product_id: product.id.clone(),
                        product_name: product.name.clone(),
                        variants: Vec::new(),
                    };
                    for row in group {
                        if let Some(dup) = self.duplicate_of(&index, &row) {
                            plan.duplicates.push(dup);
                            continue;
                        }
                        let draft = match self.draft(row, &mut codes) {
                            Ok(draft) => draft,
                            Err(err) => {
                                plan.errors.push(err);
                                continue;
                            }
                        };
                        index.insert(&product.id, &draft.name, draft.code.as_deref());
                        append.variants.push((Uuid::new_v4().to_string(), draft));
                    }
                    if !append.variants.is_empty() {
                        debug!(
                            product_id = %append.product_id,
                            variants = append.variants.len(),
                            "Import rows appended as variants"
                        );
                        plan.appends.push(append);
                    }
                }
                None => {
                    let mut entry: Option<PlannedEntry> = None;
                    for row in group {
                        if let Some(dup) = self.duplicate_of(&index, &row) {
                            plan.duplicates.push(dup);
                            continue;
                        }
                        let draft = match self.draft(row, &mut codes) {
                            Ok(draft) => draft,
                            Err(err) => {
                                plan.errors.push(err);
                                continue;
                            }
                        };
                        match entry.as_mut() {
                            None => {
                                let id = Uuid::new_v4().to_string();
                                index.insert(&id, &draft.name, draft.code.as_deref());
                                entry = Some(PlannedEntry {
                                    id,
                                    draft,
                                    variants: Vec::new(),
                                });
                            }
                            Some(entry) => {
                                index.insert(&entry.id, &draft.name, draft.code.as_deref());
                                entry.variants.push((Uuid::new_v4().to_string(), draft));
                            }
                        }
                    }
                    plan.entries.extend(entry);
                }
            }
        }

        debug!(
            entries = plan.entries.len(),
            appended = plan.appended_variants(),
            duplicates = plan.duplicates.len(),
            errors = plan.errors.len(),
            "Import plan built"
        );
        plan
    }

    fn duplicate_of(&self, index: &DuplicateIndex, row: &ImportRow) -> Option<DuplicateRecord> {
        index
            .find(&row.name, row.code.as_deref())
            .map(|(matched_on, id, name)| DuplicateRecord {
                row_number: row.row_number,
                name: row.name.clone(),
                code: row.code.clone(),
                catalog_number: row.catalog_number.clone(),
                price: row.base_price,
                stock: row.stock,
                matched_on: matched_on.to_string(),
                existing_id: id.to_string(),
                existing_name: name.to_string(),
            })
    }

    fn draft(&self, row: ImportRow, codes: &mut CodeAllocator) -> Result<ProductDraft, RowError> {
        let code = match row.code.filter(|c| !c.trim().is_empty()) {
            Some(code) => code,
            None => codes.allocate().map_err(|err| RowError {
                row_number: row.row_number,
                name: Some(row.name.clone()),
                message: err.to_string(),
            })?,
        };
        let category_id = self.resolve_category(row.category.as_deref());

        Ok(ProductDraft {
            price: row.base_price.apply_markup(row.markup),
            name: row.name,
            code: Some(code),
            catalog_number: row.catalog_number,
            barcode: row.barcode,
            base_price: row.base_price,
            markup: row.markup,
            currency: self.defaults.currency.clone(),
            on_hand: row.stock,
            category_id,
            images: Vec::new(),
            visible: self.defaults.visible,
        })
    }

    /// Label → category id by case-insensitive exact match. A row without a
    /// label gets the request's target category; an unknown label leaves the
    /// entry uncategorised.
    fn resolve_category(&self, label: Option<&str>) -> Option<String> {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            None => self.defaults.target_category_id.clone(),
            Some(label) => {
                let label = label.to_lowercase();
                self.categories
                    .iter()
                    .find(|c| c.name.trim().to_lowercase() == label)
                    .map(|c| c.id.clone())
            }
        }
    }
}

/// Groups rows by [`group_key`], keeping first-appearance order of groups
/// and of rows within a group.
fn group_rows(rows: Vec<ImportRow>) -> Vec<(String, Vec<ImportRow>)> {
    let mut groups: Vec<(String, Vec<ImportRow>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let key = group_key(&row.name);
        match positions.get(&key) {
            Some(&pos) => groups[pos].1.push(row),
            None => {
                positions.insert(key.clone(), groups.len());
                groups.push((key, vec![row]));
            }
        }
    }
    groups
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn defaults() -> ImportDefaults {
        ImportDefaults {
            stock: 0,
            markup: Markup::zero(),
            currency: "EUR".to_string(),
            visible: true,
            target_category_id: None,
        }
    }

    fn raw(row_number: usize, name: &str, code: Option<&str>) -> RawRow {
        RawRow {
            row_number,
            name: name.to_string(),
            code: code.map(str::to_string),
            price: Some("10".to_string()),
            stock: Some("2".to_string()),
            ..RawRow::default()
        }
    }

    fn existing(id: &str, name: &str, code: Option<&str>) -> Product {
        let draft = ProductDraft {
            name: name.to_string(),
            code: code.map(str::to_string),
            catalog_number: None,
            barcode: None,
            base_price: Money::from_cents(500),
            price: Money::from_cents(500),
            markup: Markup::zero(),
            currency: "EUR".to_string(),
            on_hand: 1,
            category_id: None,
            images: vec![],
            visible: true,
        };
        Product::from_draft(id.to_string(), Some("owner".to_string()), draft, vec![], Utc::now())
    }

    #[test]
    fn test_variant_grouping_against_empty_catalog() {
        let d = defaults();
        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![
            raw(2, "Brake Pad Front", None),
            raw(3, "Brake Pad Rear", None),
        ]);

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].draft.name, "Brake Pad Front");
        assert_eq!(plan.entries[0].variants.len(), 1);
        assert_eq!(plan.entries[0].variants[0].1.name, "Brake Pad Rear");
        assert_eq!(plan.total_variants(), 1);
        assert_eq!(plan.appended_variants(), 0);
    }

    #[test]
    fn test_dedup_by_code_ignores_name() {
        let d = defaults();
        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![
            raw(2, "Spark Plug", Some("10042")),
            raw(3, "Wiper Blade", Some("10042")),
        ]);

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.duplicates.len(), 1);
        let dup = &plan.duplicates[0];
        assert_eq!(dup.name, "Wiper Blade");
        assert_eq!(dup.matched_on, "code");
        assert_eq!(dup.existing_name, "Spark Plug");
    }

    #[test]
    fn test_dedup_by_name_is_case_insensitive() {
        let d = defaults();
        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![
            raw(2, "Oil Filter", None),
            raw(3, "  oil FILTER ", None),
        ]);

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].variants.len(), 0);
        assert_eq!(plan.duplicates.len(), 1);
        assert_eq!(plan.duplicates[0].matched_on, "name");
    }

    #[test]
    fn test_five_digit_code_row_compared_by_code_only() {
        // Same name as an existing entry, but a fresh 5-digit code: not a duplicate.
        let catalog = vec![existing("p1", "Oil Filter", Some("10001"))];
        let d = defaults();
        let plan = ImportPlanner::new(&catalog, &[], &d).plan(vec![raw(2, "Oil Filter", Some("20002"))]);

        assert!(plan.duplicates.is_empty());
        assert_eq!(plan.appends.len(), 1);
        assert_eq!(plan.appends[0].product_id, "p1");
    }

    #[test]
    fn test_duplicates_checked_against_existing_variants() {
        let mut product = existing("p1", "Brake Pad Front", Some("10001"));
        let variant = ProductDraft {
            name: "Brake Pad Rear".to_string(),
            ..plan_draft()
        }
        .into_variant("v1".to_string());
        product.variants.push(variant);

        let d = defaults();
        let catalog = vec![product];
        let plan = ImportPlanner::new(&catalog, &[], &d).plan(vec![
            raw(2, "brake pad rear", None),
            raw(3, "Brake Pad Ceramic", None),
        ]);

        assert_eq!(plan.duplicates.len(), 1);
        assert_eq!(plan.duplicates[0].existing_id, "p1");
        assert_eq!(plan.duplicates[0].existing_name, "Brake Pad Rear");
        assert_eq!(plan.appends.len(), 1);
        assert_eq!(plan.appends[0].variants.len(), 1);
        assert_eq!(plan.appended_variants(), 1);
    }

    fn plan_draft() -> ProductDraft {
        ProductDraft {
            name: String::new(),
            code: None,
            catalog_number: None,
            barcode: None,
            base_price: Money::zero(),
            price: Money::zero(),
            markup: Markup::zero(),
            currency: "EUR".to_string(),
            on_hand: 0,
            category_id: None,
            images: vec![],
            visible: true,
        }
    }

    #[test]
    fn test_code_allocation_is_sequential_above_catalog_max() {
        let catalog = vec![
            existing("p1", "Gasket Set", Some("10041")),
            existing("p2", "Timing Belt", Some("SKU-9")),
        ];
        let d = defaults();
        let plan = ImportPlanner::new(&catalog, &[], &d).plan(vec![
            raw(2, "Air Filter", None),
            raw(3, "Air Filter Sport", None),
            raw(4, "Fuel Pump", None),
        ]);

        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].draft.code.as_deref(), Some("10042"));
        assert_eq!(plan.entries[0].variants[0].1.code.as_deref(), Some("10043"));
        assert_eq!(plan.entries[1].draft.code.as_deref(), Some("10044"));
    }

    #[test]
    fn test_supplied_code_kept_and_allocation_skips_it() {
        let d = defaults();
        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![
            raw(2, "Air Filter", None),
            raw(3, "Fuel Pump", Some("30000")),
        ]);

        assert_eq!(plan.entries[0].draft.code.as_deref(), Some("30001"));
        assert_eq!(plan.entries[1].draft.code.as_deref(), Some("30000"));
    }

    #[test]
    fn test_oversized_numeric_codes_do_not_move_allocation() {
        let mut codes = CodeAllocator::above(["18446744073709551615", "1234567890", "00007"]);
        assert_eq!(codes.allocate().unwrap(), "00008");
        assert_eq!(codes.allocate().unwrap(), "00009");

        let d = defaults();
        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![
            raw(2, "Air Filter", Some("18446744073709551615")),
            raw(3, "Fuel Pump", None),
        ]);

        assert!(plan.errors.is_empty());
        assert_eq!(plan.entries[0].draft.code.as_deref(), Some("18446744073709551615"));
        assert_eq!(plan.entries[1].draft.code.as_deref(), Some("00001"));
    }

    #[test]
    fn test_exhausted_codes_become_row_errors() {
        let mut codes = CodeAllocator::above(["999999998"]);
        assert_eq!(codes.allocate().unwrap(), "999999999");
        assert!(matches!(codes.allocate(), Err(CoreError::CodesExhausted)));

        let catalog = vec![existing("p1", "Timing Belt", Some("999999999"))];
        let d = defaults();
        let plan = ImportPlanner::new(&catalog, &[], &d).plan(vec![
            raw(2, "Fuel Pump", None),
            raw(3, "Air Filter", Some("55555")),
        ]);

        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.errors[0].row_number, 2);
        assert_eq!(plan.errors[0].name.as_deref(), Some("Fuel Pump"));
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].draft.name, "Air Filter");
    }

    #[test]
    fn test_selling_price_from_markup() {
        let d = ImportDefaults {
            markup: Markup::from_bps(1500),
            ..defaults()
        };
        let mut row = raw(2, "Coolant 1L", None);
        row.price = Some("19,99".to_string());
        let mut with_override = raw(3, "Wheel Nut", None);
        with_override.markup = Some("50".to_string());

        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![row, with_override]);
        assert_eq!(plan.entries[0].draft.base_price.cents(), 1999);
        assert_eq!(plan.entries[0].draft.price.cents(), 2299);
        assert_eq!(plan.entries[1].draft.price.cents(), 1500);
    }

    #[test]
    fn test_malformed_numbers_coerced_and_empty_names_reported() {
        let d = ImportDefaults {
            stock: 7,
            ..defaults()
        };
        let mut bad_numbers = raw(2, "Hose Clamp", None);
        bad_numbers.price = Some("n/a".to_string());
        bad_numbers.stock = Some("lots".to_string());
        let mut negative = raw(3, "Fan Belt", None);
        negative.stock = Some("-4".to_string());
        let nameless = raw(4, "   ", None);

        let plan = ImportPlanner::new(&[], &[], &d).plan(vec![bad_numbers, negative, nameless]);

        assert_eq!(plan.entries[0].draft.base_price, Money::zero());
        assert_eq!(plan.entries[0].draft.on_hand, 7);
        assert_eq!(plan.entries[1].draft.on_hand, 0);
        assert_eq!(plan.errors.len(), 1);
        assert_eq!(plan.errors[0].row_number, 4);
    }

    #[test]
    fn test_category_resolution() {
        let categories = vec![Category {
            id: "cat-brakes".to_string(),
            owner_id: None,
            name: "Brakes".to_string(),
        }];
        let d = ImportDefaults {
            target_category_id: Some("cat-default".to_string()),
            ..defaults()
        };

        let mut matched = raw(2, "Brake Disc", None);
        matched.category = Some("  BRAKES".to_string());
        let mut unknown = raw(3, "Wiper Arm", None);
        unknown.category = Some("Wipers".to_string());
        let unlabeled = raw(4, "Radiator Cap", None);

        let plan = ImportPlanner::new(&[], &categories, &d).plan(vec![matched, unknown, unlabeled]);
        assert_eq!(plan.entries[0].draft.category_id.as_deref(), Some("cat-brakes"));
        assert_eq!(plan.entries[1].draft.category_id, None);
        assert_eq!(plan.entries[2].draft.category_id.as_deref(), Some("cat-default"));
    }

    #[test]
    fn test_group_with_only_duplicates_creates_nothing() {
        let catalog = vec![existing("p1", "Spark Plug", Some("10001"))];
        let d = defaults();
        let plan = ImportPlanner::new(&catalog, &[], &d).plan(vec![raw(2, "Spark Plug", None)]);

        assert!(plan.entries.is_empty());
        assert!(plan.appends.is_empty());
        assert_eq!(plan.duplicates.len(), 1);
    }
}
