use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;

/// Canonical record key for the customer identifier.
pub const CUSTOMER_ID_KEY: &str = "customer_id";
pub const USAGE_DROP_KEY: &str = "usage_drop_30d_pct";
pub const TICKETS_KEY: &str = "tickets_30d";

/// Risk at or above this value renders as high risk.
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;

pub const MAX_TIMING_DAYS: u32 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub u64);

impl CustomerId {
    /// Parse an identifier from a cell or record value. Accepts integers, whole floats
    /// and numeric strings (optionally prefixed with `#`).
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let parsed = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            Value::String(s) => s.parse::<CustomerId>().ok().map(|id| id.0),
            Value::Null => return Err(RecordError::MissingIdentifier),
            _ => None,
        };
        match parsed {
            Some(id) if id >= 1 => Ok(CustomerId(id)),
            _ => Err(RecordError::InvalidIdentifier(value.to_string())),
        }
    }
}

impl FromStr for CustomerId {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('#');
        let id = trimmed
            .parse::<u64>()
            .ok()
            .or_else(|| {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && *f >= 1.0)
                    .map(|f| f as u64)
            })
            .filter(|id| *id >= 1)
            .ok_or_else(|| RecordError::InvalidIdentifier(s.to_string()))?;
        Ok(CustomerId(id))
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Feature bag for one customer with the identifier normalized out of it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct CustomerRecord {
    id: CustomerId,
    features: Map<String, Value>,
}

impl CustomerRecord {
    /// Build a record from a raw feature map. Any key spelled like `customer_id`
    /// (case-insensitively, e.g. the legacy `Customer_Id`) is folded into the identifier.
    pub fn from_map(mut raw: Map<String, Value>) -> Result<Self, RecordError> {
        let id_keys: Vec<String> = raw
            .keys()
            .filter(|k| k.eq_ignore_ascii_case(CUSTOMER_ID_KEY))
            .cloned()
            .collect();
        let mut id = None;
        // Prefer the canonical spelling when both are present.
        let mut ordered = id_keys;
        ordered.sort_by_key(|k| k.as_str() != CUSTOMER_ID_KEY);
        for key in ordered {
            if let Some(value) = raw.remove(&key) {
                if id.is_none() {
                    id = Some(CustomerId::from_value(&value)?);
                }
            }
        }
        let id = id.ok_or(RecordError::MissingIdentifier)?;
        Ok(Self { id, features: raw })
    }

    /// Provisional record from a selected row where the identifier came from `id_column`.
    pub fn provisional(id: CustomerId, id_column: &str, mut row: Map<String, Value>) -> Self {
        row.remove(id_column);
        row.retain(|k, _| !k.eq_ignore_ascii_case(CUSTOMER_ID_KEY));
        Self { id, features: row }
    }

    pub fn id(&self) -> CustomerId {
        self.id
    }

    pub fn features(&self) -> &Map<String, Value> {
        &self.features
    }

    /// Numeric view of a feature; numeric strings are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.features.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    /// Prediction body: every feature, the two simulated overrides and the canonical id.
    pub fn predict_body(&self, overrides: SimulationOverrides) -> Map<String, Value> {
        let mut body = self.features.clone();
        body.insert(USAGE_DROP_KEY.into(), Value::from(overrides.usage_drop_pct));
        body.insert(TICKETS_KEY.into(), Value::from(overrides.tickets_30d));
        body.insert(CUSTOMER_ID_KEY.into(), Value::from(self.id.0));
        body
    }
}

impl TryFrom<Map<String, Value>> for CustomerRecord {
    type Error = RecordError;

    fn try_from(raw: Map<String, Value>) -> Result<Self, Self::Error> {
        CustomerRecord::from_map(raw)
    }
}

impl From<CustomerRecord> for Map<String, Value> {
    fn from(record: CustomerRecord) -> Self {
        let mut out = record.features;
        out.insert(CUSTOMER_ID_KEY.into(), Value::from(record.id.0));
        out
    }
}

/// Live slider values layered over the loaded record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOverrides {
    pub usage_drop_pct: f64,
    pub tickets_30d: f64,
}

impl SimulationOverrides {
    pub fn from_record(record: &CustomerRecord) -> Self {
        Self {
            usage_drop_pct: record.number(USAGE_DROP_KEY).unwrap_or(0.0),
            tickets_30d: record.number(TICKETS_KEY).unwrap_or(0.0),
        }
    }
}

/// One slider event; either field may be absent when only one slider moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SliderInput {
    #[serde(default)]
    pub usage_drop_pct: Option<f64>,
    #[serde(default)]
    pub tickets_30d: Option<f64>,
}

impl SliderInput {
    pub fn apply(&self, overrides: &mut SimulationOverrides) {
        if let Some(v) = self.usage_drop_pct.filter(|v| v.is_finite()) {
            overrides.usage_drop_pct = v;
        }
        if let Some(v) = self.tickets_30d.filter(|v| v.is_finite()) {
            overrides.tickets_30d = v;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    None,
    #[default]
    Discount,
    PrioritySupport,
    ProactiveOutreach,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::None => "none",
            ActionType::Discount => "discount",
            ActionType::PrioritySupport => "priority_support",
            ActionType::ProactiveOutreach => "proactive_outreach",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            ActionType::None => "none",
            ActionType::Discount => "discount",
            ActionType::PrioritySupport => "priority support",
            ActionType::ProactiveOutreach => "proactive outreach",
        }
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "none" => Ok(ActionType::None),
            "discount" => Ok(ActionType::Discount),
            "priority_support" => Ok(ActionType::PrioritySupport),
            "proactive_outreach" => Ok(ActionType::ProactiveOutreach),
            _ => Err(format!("unknown action type: {value}")),
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The analyst's current action/timing configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub action_type: ActionType,
    pub timing_days: u32,
}

impl Default for ActionPlan {
    fn default() -> Self {
        Self {
            action_type: ActionType::Discount,
            timing_days: 14,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CounterfactualRequest {
    pub customer_id: CustomerId,
    pub timing_days: u32,
    pub action_type: ActionType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualResult {
    pub customer_id: CustomerId,
    pub churn_risk_base: f64,
    pub churn_risk_counterfactual: f64,
}

impl CounterfactualResult {
    pub fn delta(&self) -> f64 {
        self.churn_risk_base - self.churn_risk_counterfactual
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct FeatureMetadata {
    #[serde(default)]
    pub features: Vec<FeatureImportance>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PredictResponse {
    #[serde(default)]
    pub churn_risk: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchRequest {
    pub timing_days: u32,
    pub action_type: ActionType,
    pub top_n: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegretRow {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub churn_risk_base: f64,
    #[serde(default)]
    pub churn_risk_counterfactual: f64,
    #[serde(default)]
    pub delta_risk: f64,
    #[serde(default)]
    pub regret_score: f64,
}

impl RegretRow {
    /// Risk reduction shown in the table, in percent.
    pub fn improvement_pct(&self) -> f64 {
        self.delta_risk * 100.0
    }

    pub fn counterfactual_is_high(&self) -> bool {
        self.churn_risk_counterfactual >= HIGH_RISK_THRESHOLD
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct BatchResponse {
    #[serde(default)]
    pub rows: Vec<RegretRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub best_action: ActionType,
    pub best_timing: u32,
    #[serde(default)]
    pub improvement: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Recommendation {
    pub fn is_actionable(&self) -> bool {
        self.best_action != ActionType::None
    }

    pub fn summary(&self) -> String {
        format!(
            "Strategy: {} at day {}. Impact: churn risk dropped by {:.1}%. \"{}\"",
            self.best_action.display_label(),
            self.best_timing,
            self.improvement * 100.0,
            self.reasoning
        )
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TriggerRequest {
    pub customer_ids: Vec<CustomerId>,
    pub timing_days: u32,
    pub action_type: ActionType,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct CustomerList {
    #[serde(default)]
    pub customer_ids: Vec<CustomerId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn legacy_identifier_spelling_is_normalized() {
        let rec = CustomerRecord::from_map(map(json!({"Customer_Id": "7", "arpu": 30.5})))
            .expect("record");
        assert_eq!(rec.id(), CustomerId(7));
        assert!(!rec.features().contains_key("Customer_Id"));
        let back: Map<String, Value> = rec.into();
        assert_eq!(back[CUSTOMER_ID_KEY], json!(7));
    }

    #[test]
    fn canonical_identifier_wins_over_legacy() {
        let rec =
            CustomerRecord::from_map(map(json!({"Customer_Id": 9, "customer_id": 3}))).unwrap();
        assert_eq!(rec.id(), CustomerId(3));
        assert!(rec.features().is_empty());
    }

    #[test]
    fn record_without_identifier_is_rejected() {
        let err = CustomerRecord::from_map(map(json!({"arpu": 1}))).unwrap_err();
        assert_eq!(err, RecordError::MissingIdentifier);
        let err = serde_json::from_value::<CustomerRecord>(json!({"customer_id": 0}));
        assert!(err.is_err());
    }

    #[test]
    fn identifier_parsing_is_tolerant() {
        assert_eq!("#42".parse::<CustomerId>().unwrap(), CustomerId(42));
        assert_eq!(CustomerId::from_value(&json!(42.0)).unwrap(), CustomerId(42));
        assert!(CustomerId::from_value(&json!(4.5)).is_err());
        assert!(CustomerId::from_value(&json!("abc")).is_err());
    }

    #[test]
    fn overrides_default_missing_fields_to_zero() {
        let rec = CustomerRecord::from_map(map(json!({"customer_id": 1, "tickets_30d": "3"})))
            .unwrap();
        let o = SimulationOverrides::from_record(&rec);
        assert_eq!(o.usage_drop_pct, 0.0);
        assert_eq!(o.tickets_30d, 3.0);
    }

    #[test]
    fn predict_body_layers_overrides_and_id() {
        let rec = CustomerRecord::from_map(map(json!({
            "Customer_Id": 42, "usage_drop_30d_pct": 10, "tickets_30d": 1, "region": "west"
        })))
        .unwrap();
        let body = rec.predict_body(SimulationOverrides {
            usage_drop_pct: 55.0,
            tickets_30d: 4.0,
        });
        assert_eq!(body["customer_id"], json!(42));
        assert_eq!(body["usage_drop_30d_pct"], json!(55.0));
        assert_eq!(body["tickets_30d"], json!(4.0));
        assert_eq!(body["region"], json!("west"));
        assert!(!body.contains_key("Customer_Id"));
    }

    #[test]
    fn slider_input_only_moves_present_fields() {
        let mut o = SimulationOverrides {
            usage_drop_pct: 10.0,
            tickets_30d: 2.0,
        };
        SliderInput {
            usage_drop_pct: None,
            tickets_30d: Some(5.0),
        }
        .apply(&mut o);
        assert_eq!(o.usage_drop_pct, 10.0);
        assert_eq!(o.tickets_30d, 5.0);
    }

    #[test]
    fn action_type_parses_labels() {
        assert_eq!(
            "Priority Support".parse::<ActionType>().unwrap(),
            ActionType::PrioritySupport
        );
        assert!("refund".parse::<ActionType>().is_err());
        let rec: Recommendation = serde_json::from_value(json!({
            "best_action": "none", "best_timing": 0, "improvement": 0.0, "reasoning": "flat"
        }))
        .unwrap();
        assert!(!rec.is_actionable());
    }
}
