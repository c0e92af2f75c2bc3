//! # Spreadsheet Payloads
//!
//! Turns an uploaded sheet into [`RawRow`]s for the import planner.
//!
//! ## Pipeline
//! ```text
//! ┌───────────────────┐    ┌──────────────┐    ┌───────────────────┐
//! │ SpreadsheetPayload│───▶│    Sheet     │───▶│   Vec<RawRow>     │
//! │  csv text  or     │    │ header row + │    │ cells picked by   │
//! │  pre-parsed rows  │    │ data rows    │    │ ColumnMapping     │
//! └───────────────────┘    └──────────────┘    └───────────────────┘
//!                                 │
//!                     ColumnMapping::detect(header)
//!                        overridden by the request's explicit mapping
//! ```
//!
//! Cells stay strings here. Numeric coercion (and its defaults) belongs to
//! [`crate::import`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Payload
// =============================================================================

/// An uploaded sheet, either raw CSV or rows already parsed by the client
/// (e.g. from an xlsx file).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum SpreadsheetPayload {
    Csv {
        data: String,
        #[serde(default)]
        delimiter: Option<String>,
    },
    Rows {
        rows: Vec<Vec<serde_json::Value>>,
    },
}

/// Header plus data rows, all cells as trimmed strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Reads the payload. The first record is the header.
    pub fn from_payload(payload: &SpreadsheetPayload) -> CoreResult<Sheet> {
        let mut records = match payload {
            SpreadsheetPayload::Csv { data, delimiter } => read_csv(data, delimiter.as_deref())?,
            SpreadsheetPayload::Rows { rows } => rows
                .iter()
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect(),
        }
        .into_iter();

        let header = records.next().ok_or(CoreError::EmptySpreadsheet)?;
        Ok(Sheet {
            header,
            rows: records.collect(),
        })
    }
}

fn read_csv(data: &str, delimiter: Option<&str>) -> CoreResult<Vec<Vec<String>>> {
    let delimiter = match delimiter {
        None | Some("") => b',',
        Some(d) if d.len() == 1 && d.is_ascii() => d.as_bytes()[0],
        Some("\\t") => b'\t',
        Some(other) => {
            return Err(CoreError::InvalidSpreadsheet(format!(
                "unsupported delimiter '{other}'"
            )))
        }
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(data.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| CoreError::InvalidSpreadsheet(e.to_string()))
        })
        .collect()
}

fn cell_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.trim().to_string(),
        // xlsx readers hand every number over as a float: 10001 arrives as 10001.0
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

// =============================================================================
// Column Mapping
// =============================================================================

/// Column index per import field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub name: Option<usize>,
    pub code: Option<usize>,
    pub catalog_number: Option<usize>,
    pub price: Option<usize>,
    pub stock: Option<usize>,
    pub category: Option<usize>,
    pub barcode: Option<usize>,
    pub markup: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Name,
    Code,
    CatalogNumber,
    Price,
    Stock,
    Category,
    Barcode,
    Markup,
}

/// Header keywords, checked in this order so "product code" is a code column
/// and "supplier part no" is a catalog number, not a name.
const KEYWORDS: &[(Field, &[&str])] = &[
    (Field::Barcode, &["barcode", "ean", "upc", "scan"]),
    (Field::CatalogNumber, &["catalog", "supplier", "part"]),
    (Field::Code, &["code", "sku", "short"]),
    (Field::Markup, &["markup", "margin"]),
    (Field::Price, &["price", "cost"]),
    (Field::Stock, &["stock", "qty", "quantity"]),
    (Field::Category, &["category", "group"]),
    (Field::Name, &["name", "product", "title", "item"]),
];

/// Alphanumeric words of a lowercased header, so "Stock_Qty" and "Qty." both
/// yield "qty".
fn header_words(title: &str) -> impl Iterator<Item = &str> {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
}

/// Whole-word match, tolerating a plural "s" ("Prices", "Parts").
fn is_keyword(word: &str, keyword: &str) -> bool {
    word == keyword || word.strip_suffix('s') == Some(keyword)
}

impl ColumnMapping {
    /// Detects columns from header keywords. The first header claiming a
    /// field wins.
    pub fn detect(header: &[String]) -> ColumnMapping {
        let mut mapping = ColumnMapping::default();
        for (index, title) in header.iter().enumerate() {
            let title = title.to_lowercase();
            let field = KEYWORDS
                .iter()
                .find(|(_, keywords)| {
                    header_words(&title).any(|word| keywords.iter().any(|k| is_keyword(word, k)))
                })
                .map(|(field, _)| *field);

            if let Some(field) = field {
                let slot = mapping.slot(field);
                if slot.is_none() {
                    *slot = Some(index);
                }
            }
        }
        mapping
    }

    /// Fields set in `explicit` replace the detected ones.
    pub fn overridden_by(self, explicit: Option<&ColumnMapping>) -> ColumnMapping {
        let Some(explicit) = explicit else {
            return self;
        };
        ColumnMapping {
            name: explicit.name.or(self.name),
            code: explicit.code.or(self.code),
            catalog_number: explicit.catalog_number.or(self.catalog_number),
            price: explicit.price.or(self.price),
            stock: explicit.stock.or(self.stock),
            category: explicit.category.or(self.category),
            barcode: explicit.barcode.or(self.barcode),
            markup: explicit.markup.or(self.markup),
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<usize> {
        match field {
            Field::Name => &mut self.name,
            Field::Code => &mut self.code,
            Field::CatalogNumber => &mut self.catalog_number,
            Field::Price => &mut self.price,
            Field::Stock => &mut self.stock,
            Field::Category => &mut self.category,
            Field::Barcode => &mut self.barcode,
            Field::Markup => &mut self.markup,
        }
    }
}

// =============================================================================
// Raw Rows
// =============================================================================

/// One data row with cells picked out per field. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// 1-based sheet row number (the header is row 1).
    pub row_number: usize,
    pub name: String,
    pub code: Option<String>,
    pub catalog_number: Option<String>,
    pub price: Option<String>,
    pub stock: Option<String>,
    pub category: Option<String>,
    pub barcode: Option<String>,
    pub markup: Option<String>,
}

/// Reads a payload into rows.
///
/// ## Errors
/// - `EmptySpreadsheet` when there is no header or no non-blank data row
/// - `MissingNameColumn` when no column maps to the name
/// - `InvalidSpreadsheet` when the CSV cannot be read
pub fn extract_rows(
    payload: &SpreadsheetPayload,
    explicit: Option<&ColumnMapping>,
) -> CoreResult<Vec<RawRow>> {
    let sheet = Sheet::from_payload(payload)?;
    let mapping = ColumnMapping::detect(&sheet.header).overridden_by(explicit);
    let name_column = mapping.name.ok_or(CoreError::MissingNameColumn)?;

    debug!(?mapping, rows = sheet.rows.len(), "Extracting spreadsheet rows");

    let rows: Vec<RawRow> = sheet
        .rows
        .iter()
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
        .map(|(index, cells)| {
            let pick = |column: Option<usize>| {
                column
                    .and_then(|c| cells.get(c))
                    .map(|c| c.trim())
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
            };
            RawRow {
                row_number: index + 2,
                name: pick(Some(name_column)).unwrap_or_default(),
                code: pick(mapping.code),
                catalog_number: pick(mapping.catalog_number),
                price: pick(mapping.price),
                stock: pick(mapping.stock),
                category: pick(mapping.category),
                barcode: pick(mapping.barcode),
                markup: pick(mapping.markup),
            }
        })
        .collect();

    if rows.is_empty() {
        return Err(CoreError::EmptySpreadsheet);
    }
    Ok(rows)
}

// =============================================================================
// Unit Tests
// =============================================================================
