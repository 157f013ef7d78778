//! # Request Handlers
//!
//! Axum request handlers for the checkout API.
//! Order creation answers with the provider payload plus the capture
//! credentials in headers; capture records the order and redirects.

use crate::session::SessionPrincipal;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shop_core::{BeginOutcome, CartSnapshot, CheckoutError, Money, Order, OrderId};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub const REFERENCE_ID_HEADER: HeaderName = HeaderName::from_static("reference-id");
pub const HX_REDIRECT_HEADER: HeaderName = HeaderName::from_static("hx-redirect");

const THANKS_PATH: &str = "/thanks";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Body of a 409 when the cart changed under the shopper
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartAdjustedResponse {
    pub cart_adjusted: bool,
    #[serde(flatten)]
    pub cart: CartSnapshot,
}

/// Capture response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub order_id: OrderId,
    pub provider_order_id: String,
    pub total: Money,
    pub redirect: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Handler error, rendered from the checkout error taxonomy
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub CheckoutError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let code = err.status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(status = code, error = %err, "Request failed");
        } else if err.is_validation() {
            debug!(status = code, error = %err, "Invalid request");
        } else {
            warn!(status = code, error = %err, "Request rejected");
        }

        // Provider failures are passed through verbatim
        if let Some(body) = err.provider_body() {
            return (status, [(CONTENT_TYPE, "application/json")], body.to_string()).into_response();
        }

        let mut response = ErrorResponse::new(err.to_string(), code);
        match &err {
            CheckoutError::InsufficientStock { sku: Some(sku) } => {
                response = response.with_details(sku.clone());
            }
            CheckoutError::CaptureUnknown { order_id } => {
                response = response.with_details(format!("check provider order {} before retrying", order_id));
            }
            _ => {}
        }
        (status, Json(response)).into_response()
    }
}

fn order_body(payload: Result<Json<Order>, JsonRejection>) -> Result<Order, ApiError> {
    payload
        .map(|Json(order)| order)
        .map_err(|rejection| CheckoutError::Validation(rejection.body_text()).into())
}

fn header_value(value: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(value)
        .map_err(|e| CheckoutError::Internal(format!("invalid header value: {}", e)).into())
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Start a checkout: check stock, price the order and create the provider order
#[instrument(skip(state, session, payload), fields(user_id = session.0.user_id()))]
pub async fn create_order(
    State(state): State<AppState>,
    session: SessionPrincipal,
    payload: Result<Json<Order>, JsonRejection>,
) -> Result<Response, ApiError> {
    let order = order_body(payload)?;

    match state.checkout.begin(session.0.user_id(), order).await? {
        BeginOutcome::CartAdjusted(cart) => {
            info!(count = cart.count, "Cart adjusted, asking shopper to review");
            let body = CartAdjustedResponse {
                cart_adjusted: true,
                cart,
            };
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        BeginOutcome::Created(created) => {
            let authorization = header_value(&format!("Bearer {}", created.bearer_token))?;
            let reference_id = header_value(&created.reference_id.to_string())?;

            let mut response = Json(created.payload).into_response();
            let headers = response.headers_mut();
            headers.insert(AUTHORIZATION, authorization);
            headers.insert(REFERENCE_ID_HEADER, reference_id);
            Ok(response)
        }
    }
}

/// Capture an approved provider order and record it
#[instrument(skip(state, session, headers, payload), fields(user_id = session.0.user_id()))]
pub async fn capture_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    session: SessionPrincipal,
    headers: HeaderMap,
    payload: Result<Json<Order>, JsonRejection>,
) -> Result<Response, ApiError> {
    let order = order_body(payload)?;
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let reference_id = headers.get(REFERENCE_ID_HEADER).and_then(|v| v.to_str().ok());

    let completed = state
        .checkout
        .complete(session.0.user_id(), &order_id, order, authorization, reference_id)
        .await?;

    info!(
        order_id = completed.order_id,
        provider_order_id = %completed.provider_order_id,
        total = %completed.total.display(),
        "Order recorded"
    );

    let body = CaptureResponse {
        order_id: completed.order_id,
        provider_order_id: completed.provider_order_id,
        total: completed.total,
        redirect: THANKS_PATH,
    };
    Ok((
        StatusCode::CREATED,
        [(HX_REDIRECT_HEADER, HeaderValue::from_static(THANKS_PATH))],
        Json(body),
    )
        .into_response())
}
