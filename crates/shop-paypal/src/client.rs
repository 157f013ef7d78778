//! # PayPal Orders Client
//!
//! Client-credentials token handling, order creation and capture against the
//! PayPal v2 Orders API.

use crate::config::PaypalConfig;
use crate::token::{AccessToken, TokenCache, TokenResponse};
use crate::types::{
    Amount, CreateOrderRequest, CreateOrderResponse, ExperienceContext, PaymentSource,
    PaypalSource, PurchaseUnitRequest, Transaction, TransactionStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use shop_core::{
    CapturedPayment, CheckoutError, CheckoutResult, Currency, PaymentGateway, PaymentProvider,
    ProviderOrder, ReferenceId,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// PayPal gateway client
///
/// Holds the shared token cache; clone the `Arc` around it, not the client,
/// to share tokens between instances.
pub struct PaypalClient {
    config: PaypalConfig,
    http: Client,
    tokens: Arc<TokenCache>,
}

impl PaypalClient {
    /// Create a new client with its own token cache
    pub fn new(config: PaypalConfig) -> CheckoutResult<Self> {
        Self::with_token_cache(config, Arc::new(TokenCache::new()))
    }

    /// Create a client around an existing token cache
    pub fn with_token_cache(config: PaypalConfig, tokens: Arc<TokenCache>) -> CheckoutResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        let config = PaypalConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &PaypalConfig {
        &self.config
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    /// Get a valid access token, fetching one if the cache is empty or expired
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> CheckoutResult<Arc<AccessToken>> {
        self.tokens
            .get_or_refresh(|| self.fetch_access_token())
            .await
    }

    async fn fetch_access_token(&self) -> CheckoutResult<AccessToken> {
        debug!("Requesting PayPal access token");

        let response = self
            .http
            .post(self.config.token_url())
            .basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        let body = response.text().await.map_err(unavailable)?;

        if !status.is_success() {
            error!("PayPal token error: status={}, body={}", status, body);
            return Err(CheckoutError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse PayPal token response: {}", e))
        })?;

        AccessToken::from_response(token, Utc::now()).map_err(|e| {
            error!("PayPal token response rejected: {}", e);
            e
        })
    }

    /// Build the create-order body for one purchase unit
    fn order_request(
        &self,
        reference_id: ReferenceId,
        currency: Currency,
        total: Decimal,
    ) -> CreateOrderRequest {
        CreateOrderRequest {
            purchase_units: vec![PurchaseUnitRequest {
                amount: Amount {
                    currency_code: currency.as_str().to_string(),
                    value: currency.format_amount(total),
                },
                reference_id: reference_id.to_string(),
            }],
            intent: "CAPTURE",
            payment_source: PaymentSource {
                paypal: PaypalSource {
                    experience_context: ExperienceContext {
                        payment_method_preference: "IMMEDIATE_PAYMENT_REQUIRED",
                        payment_method_selected: "PAYPAL",
                        brand_name: self.config.brand_name.clone(),
                        locale: self.config.locale.clone(),
                        landing_page: "LOGIN",
                        shipping_preference: "GET_FROM_FILE",
                        user_action: "PAY_NOW",
                        return_url: self.config.return_url.clone(),
                        cancel_url: self.config.cancel_url.clone(),
                    },
                },
            },
        }
    }

    /// Create a PayPal order the shopper can approve
    #[instrument(skip(self))]
    pub async fn create_order(
        &self,
        reference_id: ReferenceId,
        currency: Currency,
        total: Decimal,
    ) -> CheckoutResult<ProviderOrder> {
        if total <= Decimal::ZERO {
            return Err(CheckoutError::Validation(format!(
                "order total must be positive, got {}",
                total
            )));
        }

        let token = self.access_token().await?;
        let request = self.order_request(reference_id, currency, total);

        let response = self
            .http
            .post(self.config.orders_url())
            .bearer_auth(token.token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        let body = response.text().await.map_err(unavailable)?;

        if !status.is_success() {
            error!("PayPal create order error: status={}, body={}", status, body);
            return Err(CheckoutError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let payload: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse PayPal order response: {}", e))
        })?;
        let created: CreateOrderResponse =
            serde_json::from_value(payload.clone()).map_err(|e| {
                CheckoutError::Serialization(format!("PayPal order response has no id: {}", e))
            })?;

        info!(
            "Created PayPal order: id={}, status={}, amount={} {}",
            created.id,
            created.status,
            currency.format_amount(total),
            currency
        );

        Ok(ProviderOrder {
            provider_order_id: created.id,
            payload,
            bearer_token: token.token.expose_secret().to_string(),
            reference_id,
        })
    }

    /// Check a capture request's bearer token and reference id.
    ///
    /// The token must be the one currently cached; no call is made to PayPal.
    pub fn authenticate_capture(
        &self,
        authorization: Option<&str>,
        reference_id: Option<&str>,
    ) -> CheckoutResult<ReferenceId> {
        let presented = authorization
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CheckoutError::Unauthenticated("missing bearer token".to_string()))?;

        let current = self.tokens.current().ok_or_else(|| {
            CheckoutError::Unauthenticated("no active access token".to_string())
        })?;

        if !constant_time_compare(presented, current.token.expose_secret()) {
            warn!("Capture request carried a foreign bearer token");
            return Err(CheckoutError::Unauthenticated(
                "bearer token does not match".to_string(),
            ));
        }

        let raw = reference_id
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(CheckoutError::MissingReference)?;

        ReferenceId::parse(raw)
    }

    /// Capture an approved order. Never retried.
    #[instrument(skip(self))]
    pub async fn capture_order(&self, order_id: &str) -> CheckoutResult<CapturedPayment> {
        if !is_provider_order_id(order_id) {
            return Err(CheckoutError::Validation(format!(
                "malformed provider order id: {:?}",
                order_id
            )));
        }

        let token = self.access_token().await?;

        let unknown = |e: reqwest::Error| {
            error!("PayPal capture outcome unknown: order_id={}, error={}", order_id, e);
            CheckoutError::CaptureUnknown {
                order_id: order_id.to_string(),
            }
        };

        let response = self
            .http
            .post(self.config.capture_url(order_id))
            .bearer_auth(token.token.expose_secret())
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| if e.is_timeout() { unknown(e) } else { unavailable(e) })?;

        let status = response.status();
        // The request reached PayPal; a failed read leaves the charge ambiguous
        let body = response.text().await.map_err(unknown)?;

        if !status.is_success() {
            error!("PayPal capture error: status={}, body={}", status, body);
            return Err(CheckoutError::GatewayRejected {
                status: status.as_u16(),
                body,
            });
        }

        let transaction = Transaction::parse(&body).map_err(|e| {
            error!("PayPal capture response rejected: {}, body={}", e, body);
            e
        })?;

        if transaction.status != TransactionStatus::Completed {
            warn!(
                "PayPal capture not completed: order_id={}, status={}",
                order_id, transaction.status
            );
            return Err(CheckoutError::CaptureNotCompleted {
                status: transaction.status.to_string(),
                body,
            });
        }

        let captured = transaction.into_captured(body.clone()).map_err(|e| {
            error!("Completed PayPal capture is malformed: {}, body={}", e, body);
            e
        })?;

        info!(
            "Captured PayPal order: id={}, captures={}",
            captured.provider_order_id,
            captured.capture_ids.len()
        );

        Ok(captured)
    }
}

/// PayPal order ids are short runs of uppercase letters and digits
fn is_provider_order_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

#[async_trait]
impl PaymentGateway for PaypalClient {
    async fn create_order(
        &self,
        reference_id: ReferenceId,
        currency: Currency,
        total: Decimal,
    ) -> CheckoutResult<ProviderOrder> {
        PaypalClient::create_order(self, reference_id, currency, total).await
    }

    fn authenticate_capture(
        &self,
        authorization: Option<&str>,
        reference_id: Option<&str>,
    ) -> CheckoutResult<ReferenceId> {
        PaypalClient::authenticate_capture(self, authorization, reference_id)
    }

    async fn capture(&self, provider_order_id: &str) -> CheckoutResult<CapturedPayment> {
        self.capture_order(provider_order_id).await
    }

    fn provider(&self) -> PaymentProvider {
        PaymentProvider::Paypal
    }
}

fn unavailable(e: reqwest::Error) -> CheckoutError {
    CheckoutError::GatewayUnavailable(e.to_string())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}
