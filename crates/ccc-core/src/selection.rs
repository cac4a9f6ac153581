//! Host selection events and identifier resolution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::model::{CustomerId, CustomerRecord};

/// Tabular payload of a host selection-changed event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularResult {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

impl TabularResult {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.first().map_or(true, |r| r.is_empty())
    }

    fn row_map(&self, idx: usize) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(row) = self.rows.get(idx) {
            for (col, cell) in self.columns.iter().zip(row.iter()) {
                out.insert(col.clone(), cell.clone());
            }
        }
        out
    }
}

/// The only capability the core needs from a host: the data behind a selection.
#[async_trait]
pub trait SelectionSource: Send + Sync {
    async fn selection(&self) -> anyhow::Result<TabularResult>;
}

#[async_trait]
impl SelectionSource for TabularResult {
    async fn selection(&self) -> anyhow::Result<TabularResult> {
        Ok(self.clone())
    }
}

/// Identifier and provisional feature snapshot pulled from the first selected row.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractedSelection {
    pub customer_id: CustomerId,
    pub id_column: String,
    pub provisional: CustomerRecord,
    /// Selected rows beyond the first; they are not aggregated.
    pub ignored_rows: usize,
}

/// Rank a column name as an identifier candidate; lower is better.
fn identifier_rank(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    let mentions_id = lower.contains("id");
    if lower.contains("customer") {
        return Some(if mentions_id { 0 } else { 1 });
    }
    if lower == "id" {
        return Some(2);
    }
    if lower.contains("acc") || lower.contains("uid") {
        return Some(if mentions_id { 3 } else { 4 });
    }
    None
}

/// Pick the identifier column: any name containing "customer", equal to "id", or
/// containing "acc"/"uid". Names that also mention "id" win over ones that don't,
/// and earlier columns win ties.
pub fn resolve_identifier_column(columns: &[String]) -> Option<usize> {
    columns
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| identifier_rank(name).map(|rank| (rank, idx)))
        .min()
        .map(|(_, idx)| idx)
}

/// `Ok(None)` for an empty result set; schema or identifier problems are errors.
pub fn extract(result: &TabularResult) -> Result<Option<ExtractedSelection>, CoreError> {
    if result.is_empty() {
        return Ok(None);
    }
    let idx = resolve_identifier_column(&result.columns).ok_or_else(|| CoreError::SchemaMismatch {
        available: result.columns.clone(),
    })?;
    let id_column = result.columns[idx].clone();
    let cell = result
        .rows
        .first()
        .and_then(|row| row.get(idx))
        .unwrap_or(&Value::Null);
    let customer_id = CustomerId::from_value(cell)?;
    let provisional = CustomerRecord::provisional(customer_id, &id_column, result.row_map(0));
    Ok(Some(ExtractedSelection {
        customer_id,
        id_column,
        provisional,
        ignored_rows: result.rows.len().saturating_sub(1),
    }))
}
