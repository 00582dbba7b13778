//! # REST API
//!
//! Builds the axum router for the charge service. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path         | Description                                  |
//! |--------|--------------|----------------------------------------------|
//! | GET    | `/health`    | Liveness probe                               |
//! | POST   | `/charges`   | Mint a charge link for an amount and note    |
//! | GET    | `/c/:token`  | Resolve a charge link to its dynamic payload |
//! | POST   | `/payloads`  | Dynamic payload for an amount, no link       |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use qris_protocol::{format_idr, Amount, ChargeRecord, DynamicPayloadBuilder, TokenCodec};

use crate::links::charge_link;
use crate::metrics::SharedMetrics;

/// Body of the 404 for any link that does not decode.
pub const INVALID_LINK_MESSAGE: &str = "link not valid";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone. Nothing in it changes after startup.
#[derive(Clone)]
pub struct AppState {
    /// The service's reported version string.
    pub version: String,
    /// Origin charge links are built on, without a trailing slash.
    pub public_origin: Arc<str>,
    /// The merchant template, parsed once at startup.
    pub builder: Arc<DynamicPayloadBuilder>,
    /// Token codec holding the configured obfuscation key.
    pub codec: Arc<TokenCodec>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    pub fn new(
        version: impl Into<String>,
        public_origin: &str,
        builder: DynamicPayloadBuilder,
        codec: TokenCodec,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            version: version.into(),
            public_origin: Arc::from(public_origin.trim_end_matches('/')),
            builder: Arc::new(builder),
            codec: Arc::new(codec),
            metrics,
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/charges", post(create_charge_handler))
        .route("/c/:token", get(resolve_charge_handler))
        .route("/payloads", post(payload_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /charges`.
#[derive(Debug, Deserialize)]
pub struct CreateChargeRequest {
    /// Amount in rupiah.
    pub amount: f64,
    /// Free-text note shown to the payer.
    #[serde(default)]
    pub note: Option<String>,
}

/// Body of `POST /payloads`.
#[derive(Debug, Deserialize)]
pub struct PayloadRequest {
    pub amount: f64,
}

/// A charge, as returned on creation and on link resolution.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub token: String,
    pub link: String,
    /// Dynamic payload to render as a QR code.
    pub payload: String,
    pub amount: f64,
    /// Amount formatted for display, e.g. `Rp 75.000`.
    pub display_amount: String,
    pub note: Option<String>,
    /// RFC 3339 creation time, when the link carries one.
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayloadResponse {
    pub payload: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl ChargeResponse {
    fn new(state: &AppState, token: String, record: ChargeRecord) -> Self {
        Self {
            link: charge_link(&state.public_origin, &token),
            payload: state.builder.build(record.amount),
            amount: record.amount.value(),
            display_amount: format_idr(record.amount),
            note: record.note,
            created_at: record.created_at.map(format_timestamp),
            token,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the service is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "version": state.version })),
    )
}

/// `POST /charges`: mints a charge link stamped with the current time.
///
/// Returns 422 when the amount cannot be put in a payload.
async fn create_charge_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateChargeRequest>,
) -> Response {
    let amount = match Amount::new(req.amount) {
        Ok(amount) => amount,
        Err(e) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    };

    let mut record = ChargeRecord::new(amount).with_created_at(Utc::now());
    if let Some(note) = req.note {
        record = record.with_note(note);
    }

    let token = state.codec.encode(&record);
    let resp = ChargeResponse::new(&state, token, record);

    state.metrics.charges_created_total.inc();
    state.metrics.payloads_generated_total.inc();
    tracing::info!(amount = %amount, token = %resp.token, "charge created");

    (StatusCode::CREATED, Json(resp)).into_response()
}

/// `GET /c/:token`: resolves a charge link.
///
/// Any decode failure is a 404 with the same message, whatever the cause.
async fn resolve_charge_handler(
    Path(token): Path<String>,
    State(state): State<AppState>,
) -> Response {
    match state.codec.decode(&token) {
        Ok(record) => {
            state.metrics.links_resolved_total.inc();
            state.metrics.payloads_generated_total.inc();
            Json(ChargeResponse::new(&state, token, record)).into_response()
        }
        Err(e) => {
            state.metrics.links_rejected_total.inc();
            tracing::debug!(token = %token, reason = %e, "rejected charge link");
            error_response(StatusCode::NOT_FOUND, INVALID_LINK_MESSAGE)
        }
    }
}

/// `POST /payloads`: dynamic payload for an amount, without minting a link.
async fn payload_handler(
    State(state): State<AppState>,
    Json(req): Json<PayloadRequest>,
) -> Response {
    match Amount::new(req.amount) {
        Ok(amount) => {
            state.metrics.payloads_generated_total.inc();
            Json(PayloadResponse {
                payload: state.builder.build(amount),
            })
            .into_response()
        }
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use qris_protocol::{verify_checksum, ObfuscationKey};
    use tower::ServiceExt;

    use crate::metrics::NodeMetrics;

    const TEMPLATE: &str = "00020101021126660014ID.CO.QRIS.WWW01189360091500000000010215ID10200000000010303UMI5204581253033605802ID5917WARUNG KOPI SENJA6008SEMARANG61055024163041304";

    /// `{"a":75000,"n":"Kopi susu","t":1760400000000}` under the default key.
    const KOPI_SUSU_TOKEN: &str =
        "GlgHEAoFAFFKVh4SXBdbWC1dQFsVEg8VRxIeFxVYXAMHBAVVSlYCAAIFUUob";

    fn expected_payload_75000() -> String {
        format!("{}540875000.0063045EC9", &TEMPLATE[..TEMPLATE.len() - 8])
    }

    fn test_app_state() -> AppState {
        AppState::new(
            "0.1.0-test",
            "https://pay.example.id/",
            DynamicPayloadBuilder::new(TEMPLATE).unwrap(),
            TokenCodec::default(),
            Arc::new(NodeMetrics::new().unwrap()),
        )
    }

    /// Sends a GET request and returns the (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    /// Sends a POST request with JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["version"], "0.1.0-test");
    }

    #[tokio::test]
    async fn resolve_known_link() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let (status, body) = get(&router, &format!("/c/{KOPI_SUSU_TOKEN}")).await;

        assert_eq!(status, StatusCode::OK);
        let resp: ChargeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.token, KOPI_SUSU_TOKEN);
        assert_eq!(
            resp.link,
            format!("https://pay.example.id/c/{KOPI_SUSU_TOKEN}")
        );
        assert_eq!(resp.payload, expected_payload_75000());
        assert_eq!(resp.amount, 75000.0);
        assert_eq!(resp.display_amount, "Rp\u{a0}75.000");
        assert_eq!(resp.note.as_deref(), Some("Kopi susu"));
        assert_eq!(resp.created_at.as_deref(), Some("2025-10-14T00:00:00.000Z"));
        assert_eq!(state.metrics.links_resolved_total.get(), 1);
    }

    #[tokio::test]
    async fn resolve_invalid_links_returns_404() {
        let state = test_app_state();
        let router = create_router(state.clone());

        // Garbage, zero amount, negative amount, missing amount.
        for token in ["not-a-token", "GlgHEAoCSA", "GlgHEAofABw", "GlgIEAoQTUMH"] {
            let (status, body) = get(&router, &format!("/c/{token}")).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{token}");
            let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
            assert_eq!(err.error, INVALID_LINK_MESSAGE);
        }
        assert_eq!(state.metrics.links_rejected_total.get(), 4);
        assert_eq!(state.metrics.links_resolved_total.get(), 0);
    }

    #[tokio::test]
    async fn link_minted_under_other_key_is_not_valid() {
        let state = AppState::new(
            "0.1.0-test",
            "https://pay.example.id",
            DynamicPayloadBuilder::new(TEMPLATE).unwrap(),
            TokenCodec::new(ObfuscationKey::new("merchant-key").unwrap()),
            Arc::new(NodeMetrics::new().unwrap()),
        );
        let router = create_router(state);

        let (status, _) = get(&router, "/c/GlgHEAoFAFFKVk8").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get(&router, "/c/FkcTQVJWW0QdWxg").await;
        assert_eq!(status, StatusCode::OK);
        let resp: ChargeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.amount, 75000.0);
        assert!(resp.note.is_none());
        assert!(resp.created_at.is_none());
    }

    #[tokio::test]
    async fn create_charge_then_resolve() {
        let state = test_app_state();
        let router = create_router(state.clone());

        let (status, body) = post_json(
            &router,
            "/charges",
            serde_json::json!({ "amount": 75000, "note": "Kopi susu" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created: ChargeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(created.payload, expected_payload_75000());
        assert!(created.link.starts_with("https://pay.example.id/c/"));
        assert!(created.link.ends_with(&created.token));
        assert!(created.created_at.is_some());

        let (status, body) = get(&router, &format!("/c/{}", created.token)).await;
        assert_eq!(status, StatusCode::OK);
        let resolved: ChargeResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resolved.payload, created.payload);
        assert_eq!(resolved.note, created.note);
        assert_eq!(resolved.created_at, created.created_at);

        assert_eq!(state.metrics.charges_created_total.get(), 1);
        assert_eq!(state.metrics.payloads_generated_total.get(), 2);
    }

    #[tokio::test]
    async fn create_charge_without_note() {
        let router = create_router(test_app_state());
        let (status, body) =
            post_json(&router, "/charges", serde_json::json!({ "amount": 12500.5 })).await;

        assert_eq!(status, StatusCode::CREATED);
        let created: ChargeResponse = serde_json::from_slice(&body).unwrap();
        assert!(created.note.is_none());
        assert_eq!(created.amount, 12500.5);
        assert!(created.payload.contains("540812500.50"));
        assert!(verify_checksum(&created.payload));
    }

    #[tokio::test]
    async fn create_charge_rejects_bad_amounts() {
        let state = test_app_state();
        let router = create_router(state.clone());

        for amount in [0.0, -100.0, 0.001] {
            let (status, body) =
                post_json(&router, "/charges", serde_json::json!({ "amount": amount })).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{amount}");
            let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
            assert!(err.error.starts_with("invalid amount"));
        }
        assert_eq!(state.metrics.charges_created_total.get(), 0);
    }

    #[tokio::test]
    async fn create_charge_requires_amount() {
        let router = create_router(test_app_state());
        let (status, _) =
            post_json(&router, "/charges", serde_json::json!({ "note": "x" })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn payload_endpoint_returns_payload() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let (status, body) =
            post_json(&router, "/payloads", serde_json::json!({ "amount": 75000 })).await;

        assert_eq!(status, StatusCode::OK);
        let resp: PayloadResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.payload, expected_payload_75000());
        assert_eq!(state.metrics.payloads_generated_total.get(), 1);
        assert_eq!(state.metrics.charges_created_total.get(), 0);
    }

    #[tokio::test]
    async fn payload_endpoint_rejects_zero() {
        let router = create_router(test_app_state());
        let (status, _) =
            post_json(&router, "/payloads", serde_json::json!({ "amount": 0 })).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
