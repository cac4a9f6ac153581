//! Typed wrapper over the backend REST boundary.
//!
//! Each operation validates and serializes its request, issues exactly one call and
//! normalizes failures into [`ApiError`]. Retries and staleness checks belong to callers.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{excerpt, ApiError};
use crate::http_client;
use crate::model::{
    BatchRequest, BatchResponse, CounterfactualRequest, CounterfactualResult, CustomerId,
    CustomerList, CustomerRecord, FeatureImportance, FeatureMetadata, PredictResponse,
    Recommendation, RegretRow, SimulationOverrides, TriggerRequest, MAX_TIMING_DAYS,
};

const MAX_TOP_N: u32 = 5000;

pub struct ApiClient {
    http: reqwest::Client,
    base: RwLock<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = http_client::client(config)
            .map_err(|err| ApiError::InvalidRequest(format!("building http client: {err}")))?;
        Ok(Self::with_client(http, config.api_base()))
    }

    pub fn with_client(http: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            http,
            base: RwLock::new(normalize_base(&base.into())),
        }
    }

    pub fn base(&self) -> String {
        self.base.read().clone()
    }

    /// Point later calls at a different backend; in-flight calls keep their URL.
    pub fn set_base(&self, base: &str) {
        *self.base.write() = normalize_base(base);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.read(), path)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let started = Instant::now();
        let resp = req
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| ApiError::transport(path, err))?;
        let status = resp.status();
        debug!(
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend call"
        );
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body_excerpt: excerpt(&body),
            });
        }
        resp.json::<T>().await.map_err(|err| ApiError::Decode {
            path: path.to_string(),
            detail: err.to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let req = self.http.get(self.url(path));
        self.execute(path, req).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let req = self.http.post(self.url(path)).json(body);
        self.execute(path, req).await
    }

    /// `POST /counterfactual`
    pub async fn counterfactual(
        &self,
        req: &CounterfactualRequest,
    ) -> Result<CounterfactualResult, ApiError> {
        validate_timing(req.timing_days)?;
        self.post("/counterfactual", req).await
    }

    /// `GET /metadata/features`, in relevance order.
    pub async fn feature_metadata(&self) -> Result<Vec<FeatureImportance>, ApiError> {
        let meta: FeatureMetadata = self.get("/metadata/features").await?;
        Ok(meta.features)
    }

    /// `GET /customer/{id}`; the identifier spelling is normalized on the way in.
    pub async fn customer(&self, id: CustomerId) -> Result<CustomerRecord, ApiError> {
        self.get(&format!("/customer/{id}")).await
    }

    /// `POST /predict`; `None` when the backend has no usable risk.
    pub async fn predict(
        &self,
        record: &CustomerRecord,
        overrides: SimulationOverrides,
    ) -> Result<Option<f64>, ApiError> {
        let body = record.predict_body(overrides);
        let resp: PredictResponse = self.post("/predict", &body).await?;
        Ok(resp.churn_risk)
    }

    /// `POST /batch_counterfactual`
    pub async fn batch_counterfactual(&self, req: &BatchRequest) -> Result<Vec<RegretRow>, ApiError> {
        validate_timing(req.timing_days)?;
        if req.top_n == 0 || req.top_n > MAX_TOP_N {
            return Err(ApiError::InvalidRequest(format!(
                "top_n must be within 1..={MAX_TOP_N}, got {}",
                req.top_n
            )));
        }
        let resp: BatchResponse = self.post("/batch_counterfactual", req).await?;
        Ok(resp.rows)
    }

    /// `GET /recommend/{id}`
    pub async fn recommend(&self, id: CustomerId) -> Result<Recommendation, ApiError> {
        self.get(&format!("/recommend/{id}")).await
    }

    /// `POST /action/trigger`; only success matters.
    pub async fn trigger_action(&self, req: &TriggerRequest) -> Result<(), ApiError> {
        validate_timing(req.timing_days)?;
        if req.customer_ids.is_empty() {
            return Err(ApiError::InvalidRequest("customer_ids is empty".into()));
        }
        let _ack: serde_json::Value = self.post("/action/trigger", req).await?;
        Ok(())
    }

    /// `GET /metadata/customers`
    pub async fn list_customers(&self) -> Result<Vec<CustomerId>, ApiError> {
        let list: CustomerList = self.get("/metadata/customers").await?;
        Ok(list.customer_ids)
    }

    /// `GET /health` bounded by `timeout`; returns the round-trip time.
    pub async fn health(&self, timeout: Duration) -> Result<Duration, ApiError> {
        let started = Instant::now();
        let req = self.http.get(self.url("/health")).timeout(timeout);
        let _body: serde_json::Value = self.execute("/health", req).await?;
        Ok(started.elapsed())
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

fn validate_timing(timing_days: u32) -> Result<(), ApiError> {
    if timing_days > MAX_TIMING_DAYS {
        return Err(ApiError::InvalidRequest(format!(
            "timing_days must be within 0..={MAX_TIMING_DAYS}, got {timing_days}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActionType;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), server.base_url() + "/")
    }

    #[tokio::test]
    async fn non_success_status_is_normalized() {
        let server = MockServer::start_async().await;
        let long_body = "x".repeat(400);
        server
            .mock_async(|when, then| {
                when.method(POST).path("/batch_counterfactual");
                then.status(500).body(long_body.clone());
            })
            .await;
        let api = client_for(&server);
        let err = api
            .batch_counterfactual(&BatchRequest {
                timing_days: 7,
                action_type: ActionType::Discount,
                top_n: 20,
            })
            .await
            .unwrap_err();
        match err {
            ApiError::Status {
                status,
                body_excerpt,
            } => {
                assert_eq!(status, 500);
                assert_eq!(body_excerpt.len(), 100);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn counterfactual_posts_plan_fields() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/counterfactual")
                    .json_body(json!({"customer_id": 42, "timing_days": 14, "action_type": "priority_support"}));
                then.status(200).json_body(json!({
                    "customer_id": 42,
                    "timing_days": 14,
                    "action_type": "priority_support",
                    "churn_risk_base": 0.62,
                    "churn_risk_counterfactual": 0.31,
                    "delta_risk": 0.31,
                    "saved": true
                }));
            })
            .await;
        let api = client_for(&server);
        let cf = api
            .counterfactual(&CounterfactualRequest {
                customer_id: CustomerId(42),
                timing_days: 14,
                action_type: ActionType::PrioritySupport,
            })
            .await
            .expect("counterfactual");
        mock.assert_async().await;
        assert!((cf.delta() - 0.31).abs() < 1e-9);
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_wire() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/action/trigger");
                then.status(200).json_body(json!({"ok": true}));
            })
            .await;
        let api = client_for(&server);
        let err = api
            .trigger_action(&TriggerRequest {
                customer_ids: vec![],
                timing_days: 7,
                action_type: ActionType::Discount,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        let err = api
            .trigger_action(&TriggerRequest {
                customer_ids: vec![CustomerId(1)],
                timing_days: 61,
                action_type: ActionType::Discount,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        assert_eq!(mock.hits_async().await, 0);
    }

    #[tokio::test]
    async fn customer_record_accepts_legacy_identifier() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/customer/5");
                then.status(200)
                    .json_body(json!({"Customer_Id": 5, "usage_drop_30d_pct": 12.5}));
            })
            .await;
        let api = client_for(&server);
        let rec = api.customer(CustomerId(5)).await.expect("record");
        assert_eq!(rec.id(), CustomerId(5));
        assert_eq!(rec.number("usage_drop_30d_pct"), Some(12.5));
    }

    #[tokio::test]
    async fn predict_null_risk_is_none() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/predict");
                then.status(200)
                    .json_body(json!({"customer_id": 1, "churn_risk": null}));
            })
            .await;
        let api = client_for(&server);
        let rec: CustomerRecord = serde_json::from_value(json!({"customer_id": 1})).unwrap();
        let risk = api
            .predict(&rec, SimulationOverrides::default())
            .await
            .expect("predict");
        assert!(risk.is_none());
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let api = ApiClient::with_client(reqwest::Client::new(), "http://127.0.0.1:9");
        let err = api.health(Duration::from_millis(500)).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport { .. }), "{err:?}");
    }
}
