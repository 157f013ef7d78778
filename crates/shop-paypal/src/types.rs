//! # PayPal Orders API Types
//!
//! Typed request and response bodies for the v2 Orders API. Capture
//! responses are decoded into [`Transaction`] and validated before anything
//! is read from them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{CapturedPayment, CheckoutError, CheckoutResult, Payer};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Create Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub currency_code: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderRequest {
    pub purchase_units: Vec<PurchaseUnitRequest>,
    pub intent: &'static str,
    pub payment_source: PaymentSource,
}

#[derive(Debug, Serialize)]
pub struct PurchaseUnitRequest {
    pub amount: Amount,
    pub reference_id: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentSource {
    pub paypal: PaypalSource,
}

#[derive(Debug, Serialize)]
pub struct PaypalSource {
    pub experience_context: ExperienceContext,
}

#[derive(Debug, Serialize)]
pub struct ExperienceContext {
    pub payment_method_preference: &'static str,
    pub payment_method_selected: &'static str,
    pub brand_name: String,
    pub locale: String,
    pub landing_page: &'static str,
    pub shipping_preference: &'static str,
    pub user_action: &'static str,
    pub return_url: String,
    pub cancel_url: String,
}

/// The fields of a create-order response the client reads
#[derive(Debug, Deserialize)]
pub struct CreateOrderResponse {
    pub id: String,
    #[serde(default)]
    pub status: String,
}

// =============================================================================
// Capture
// =============================================================================

/// Transaction status reported on capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Completed,
    Pending,
    PartiallyRefunded,
    Declined,
    Refunded,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::PartiallyRefunded => "PARTIALLY_REFUNDED",
            TransactionStatus::Declined => "DECLINED",
            TransactionStatus::Refunded => "REFUNDED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SellerReceivableBreakdown {
    pub gross_amount: Option<Amount>,
    pub paypal_fee: Option<Amount>,
    pub net_amount: Option<Amount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub id: String,
    #[serde(default)]
    pub status: String,
    pub amount: Option<Amount>,
    #[serde(default)]
    pub seller_receivable_breakdown: SellerReceivableBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapturePurchaseUnit {
    #[serde(default)]
    pub reference_id: String,
    #[serde(default)]
    pub payments: Payments,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayerName {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub surname: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionPayer {
    #[serde(default)]
    pub name: PayerName,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub payer_id: String,
}

/// Capture response
#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub status: TransactionStatus,
    #[serde(default)]
    pub purchase_units: Vec<CapturePurchaseUnit>,
    #[serde(default)]
    pub payer: TransactionPayer,
}

impl Transaction {
    /// Decode a capture response body
    pub fn parse(body: &str) -> CheckoutResult<Self> {
        serde_json::from_str(body).map_err(|e| {
            CheckoutError::MalformedTransaction(format!("Failed to parse capture response: {}", e))
        })
    }

    fn captures(&self) -> CheckoutResult<impl Iterator<Item = &Capture> + '_> {
        if self.purchase_units.is_empty() {
            return Err(CheckoutError::MalformedTransaction(format!(
                "transaction {} has no purchase units",
                self.id
            )));
        }
        Ok(self.purchase_units.iter().flat_map(|u| u.payments.captures.iter()))
    }

    /// Ids of every capture across all purchase units
    pub fn capture_ids(&self) -> CheckoutResult<Vec<String>> {
        let ids: Vec<String> = self.captures()?.map(|c| c.id.clone()).collect();
        if ids.is_empty() {
            return Err(CheckoutError::MalformedTransaction(format!(
                "transaction {} has no captures",
                self.id
            )));
        }
        Ok(ids)
    }

    /// Net amount received for every capture
    pub fn net_amounts(&self) -> CheckoutResult<Vec<Decimal>> {
        let amounts = self
            .captures()?
            .map(|capture| {
                let net = capture
                    .seller_receivable_breakdown
                    .net_amount
                    .as_ref()
                    .ok_or_else(|| {
                        CheckoutError::MalformedTransaction(format!(
                            "capture {} has no net amount",
                            capture.id
                        ))
                    })?;
                Decimal::from_str(net.value.trim()).map_err(|e| {
                    CheckoutError::MalformedTransaction(format!(
                        "capture {} net amount '{}': {}",
                        capture.id, net.value, e
                    ))
                })
            })
            .collect::<CheckoutResult<Vec<_>>>()?;

        if amounts.is_empty() {
            return Err(CheckoutError::MalformedTransaction(format!(
                "transaction {} has no captures",
                self.id
            )));
        }
        Ok(amounts)
    }

    /// Non-empty reference ids of the purchase units
    pub fn reference_ids(&self) -> Vec<String> {
        self.purchase_units
            .iter()
            .map(|u| u.reference_id.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn payer(&self) -> Payer {
        let name = format!("{} {}", self.payer.name.given_name, self.payer.name.surname);
        Payer {
            name: name.trim().to_string(),
            email: self.payer.email_address.clone(),
            payer_id: self.payer.payer_id.clone(),
        }
    }

    /// Reduce a completed transaction to what the order record needs
    pub fn into_captured(self, raw_body: String) -> CheckoutResult<CapturedPayment> {
        Ok(CapturedPayment {
            capture_ids: self.capture_ids()?,
            reference_ids: self.reference_ids(),
            net_amounts: self.net_amounts()?,
            payer: self.payer(),
            provider_order_id: self.id,
            raw_body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETED_BODY: &str = r#"{
        "id": "5O190127TN364715T",
        "status": "COMPLETED",
        "purchase_units": [{
            "reference_id": "d9f80740-38f0-11e8-b467-0ed5f89f718b",
            "payments": {
                "captures": [{
                    "id": "3C679366HH908993F",
                    "status": "COMPLETED",
                    "amount": {"currency_code": "USD", "value": "19.99"},
                    "seller_receivable_breakdown": {
                        "gross_amount": {"currency_code": "USD", "value": "19.99"},
                        "paypal_fee": {"currency_code": "USD", "value": "1.08"},
                        "net_amount": {"currency_code": "USD", "value": "18.91"}
                    }
                }]
            }
        }],
        "payer": {
            "name": {"given_name": "John", "surname": "Doe"},
            "email_address": "customer@example.com",
            "payer_id": "QYR5Z8XDVJNXQ"
        }
    }"#;

    #[test]
    fn test_completed_transaction() {
        let transaction = Transaction::parse(COMPLETED_BODY).unwrap();
        assert_eq!(transaction.status, TransactionStatus::Completed);

        let captured = transaction.into_captured(COMPLETED_BODY.to_string()).unwrap();
        assert_eq!(captured.capture_ids, vec!["3C679366HH908993F"]);
        assert_eq!(captured.net_amounts, vec![Decimal::from_str("18.91").unwrap()]);
        assert_eq!(captured.payer.name, "John Doe");
        assert_eq!(captured.payer.payer_id, "QYR5Z8XDVJNXQ");
        assert_eq!(captured.provider_order_id, "5O190127TN364715T");
        assert_eq!(
            captured.reference_ids,
            vec!["d9f80740-38f0-11e8-b467-0ed5f89f718b"]
        );
    }

    #[test]
    fn test_unknown_status_is_malformed() {
        let err = Transaction::parse(r#"{"id":"X","status":"VOIDED"}"#).unwrap_err();
        assert!(matches!(err, CheckoutError::MalformedTransaction(_)));
    }

    #[test]
    fn test_missing_captures_are_malformed() {
        let transaction = Transaction::parse(r#"{"id":"X","status":"COMPLETED"}"#).unwrap();
        assert!(transaction.capture_ids().is_err());
        assert!(transaction.net_amounts().is_err());

        let transaction = Transaction::parse(
            r#"{"id":"X","status":"COMPLETED","purchase_units":[{"payments":{"captures":[]}}]}"#,
        )
        .unwrap();
        assert!(transaction.capture_ids().is_err());
    }

    #[test]
    fn test_bad_net_amount_is_malformed() {
        let body = r#"{"id":"X","status":"COMPLETED","purchase_units":[{"payments":{"captures":[
            {"id":"C1","seller_receivable_breakdown":{"net_amount":{"currency_code":"USD","value":"ten"}}}
        ]}}]}"#;
        let transaction = Transaction::parse(body).unwrap();
        assert!(matches!(
            transaction.net_amounts(),
            Err(CheckoutError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_create_order_request_shape() {
        let request = CreateOrderRequest {
            purchase_units: vec![PurchaseUnitRequest {
                amount: Amount {
                    currency_code: "USD".into(),
                    value: "19.99".into(),
                },
                reference_id: "ref".into(),
            }],
            intent: "CAPTURE",
            payment_source: PaymentSource {
                paypal: PaypalSource {
                    experience_context: ExperienceContext {
                        payment_method_preference: "IMMEDIATE_PAYMENT_REQUIRED",
                        payment_method_selected: "PAYPAL",
                        brand_name: "Storefront".into(),
                        locale: "en-US".into(),
                        landing_page: "LOGIN",
                        shipping_preference: "GET_FROM_FILE",
                        user_action: "PAY_NOW",
                        return_url: "http://localhost:8080/thanks".into(),
                        cancel_url: "http://localhost:8080/cart".into(),
                    },
                },
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["purchase_units"][0]["amount"]["value"], "19.99");
        assert_eq!(
            json["payment_source"]["paypal"]["experience_context"]["user_action"],
            "PAY_NOW"
        );
    }
}
