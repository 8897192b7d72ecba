//! CSV loader for batch quotes.
//!
//! ## CSV Format
//!
//! Headers are matched by name, so column order does not matter. Header
//! names are case-sensitive.
//!
//! | Column               | Required | Type    | Notes                                          |
//! |----------------------|----------|---------|------------------------------------------------|
//! | `name`               | yes      | string  | Lead or company name, echoed in the output     |
//! | `revenue`            | yes      | money   | `20000`, `1234.56` or `R$ 1.234,56`; blank or unparsable means no quote |
//! | `employee_count`     | no       | integer | Blank means 0; negative values are clamped to 0 |
//! | `use_fiscal_address` | no       | flag    | `true`/`false`, `sim`/`nao`, `yes`/`no`, `1`/`0`; blank means false |
//! | `state`              | no       | string  | Two-letter UF code, e.g. `SP`                  |
//!
//! ### Example
//!
//! ```csv
//! name,revenue,employee_count,use_fiscal_address,state
//! Padaria Souza,20000,0,false,SP
//! Estúdio Lima,"R$ 100.000,00",2,sim,SP
//! ```
use abertura_core::calculations::common::parse_money;
use rust_decimal::Decimal;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Serde-compatible row that mirrors the CSV layout exactly
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    revenue: String,
    #[serde(default)]
    employee_count: Option<i64>,
    #[serde(default)]
    use_fiscal_address: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// One lead to be quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub name: String,
    /// `None` when the cell was blank or not a currency amount.
    pub revenue: Option<Decimal>,
    /// As written; the form rules clamp it when the quote is computed.
    pub employee_count: i64,
    pub use_fiscal_address: bool,
    pub state: String,
}

// ---------------------------------------------------------------------------
// Public error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CsvLoadError {
    /// Bad structure, missing required column, type mismatch, etc.
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// `row` is 1-based (header = row 0).
    #[error("unrecognised use_fiscal_address value '{value}' on row {row}")]
    InvalidFlag { value: String, row: usize },

    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Core loader
// ---------------------------------------------------------------------------

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "" | "false" | "nao" | "não" | "no" | "0" => Some(false),
        "true" | "sim" | "yes" | "1" => Some(true),
        _ => None,
    }
}

fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<QuoteRequest, CsvLoadError> {
    let flag = row.use_fiscal_address.unwrap_or_default();
    let use_fiscal_address = parse_flag(&flag).ok_or(CsvLoadError::InvalidFlag {
        value: flag,
        row: row_number,
    })?;

    Ok(QuoteRequest {
        name: row.name,
        revenue: parse_money(&row.revenue),
        employee_count: row.employee_count.unwrap_or(0),
        use_fiscal_address,
        state: row.state.unwrap_or_default().to_uppercase(),
    })
}

/// Parses CSV text and returns the requests in file order.
///
/// # Errors
///
/// * [CsvLoadError::Parse] if the CSV is structurally invalid or a field
///   cannot be deserialised.
/// * [CsvLoadError::InvalidFlag] if a `use_fiscal_address` cell is not a
///   recognised yes/no value.
pub fn load_from_str(input: &str) -> Result<Vec<QuoteRequest>, CsvLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(input.as_bytes());

    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, result)| {
            let row = result?;
            convert_row(row, idx + 1)
        })
        .collect()
}

/// Reads a file from disk and delegates to [load_from_str].
pub fn load_from_file(path: &std::path::Path) -> Result<Vec<QuoteRequest>, CsvLoadError> {
    let contents = std::fs::read_to_string(path).map_err(|source| CsvLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_from_str(&contents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
