//! # Money Engine
//!
//! Currency-scoped fixed-precision arithmetic. Every amount is truncated
//! toward zero to its currency's scale before it takes part in a product or
//! a sum, and accumulation happens in `Decimal`, never in binary floats.

use crate::error::{CheckoutError, CheckoutResult};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    USD,
    COP,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::COP => "COP",
        }
    }

    /// Number of decimal places amounts are truncated to
    pub fn scale(&self) -> u32 {
        match self {
            Currency::USD => 2,
            Currency::COP => 3,
        }
    }

    /// Truncate toward zero to this currency's scale
    pub fn truncate(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale(), RoundingStrategy::ToZero)
    }

    /// Format with exactly `scale` decimals, as the payment provider expects
    pub fn format_amount(&self, amount: Decimal) -> String {
        let mut truncated = self.truncate(amount);
        truncated.rescale(self.scale());
        truncated.to_string()
    }

    fn symbol(&self) -> &'static str {
        match self {
            Currency::USD => "$",
            Currency::COP => "COP ",
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = CheckoutError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "USD" => Ok(Currency::USD),
            "COP" => Ok(Currency::COP),
            other => Err(CheckoutError::UnsupportedCurrency {
                currency: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = CheckoutError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        code.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.as_str().to_string()
    }
}

/// An amount tagged with its currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: Currency,
}

impl Money {
    /// Create a money value, truncated to the currency scale
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            amount: currency.truncate(amount),
            currency,
        }
    }

    /// Format for display (e.g., "$10.00")
    pub fn display(&self) -> String {
        format!(
            "{}{}",
            self.currency.symbol(),
            self.currency.format_amount(self.amount)
        )
    }
}

/// Anything that carries a unit price and a quantity
pub trait PricedLine {
    fn unit_price(&self) -> Decimal;
    fn quantity(&self) -> u32;
}

/// Total of `items` in `currency`.
///
/// Each unit price is truncated to the currency scale before it is multiplied
/// by its quantity.
pub fn total<L: PricedLine>(currency: Currency, items: &[L]) -> CheckoutResult<Decimal> {
    if items.is_empty() {
        return Err(CheckoutError::EmptyItemSet);
    }

    let mut sum = Decimal::ZERO;
    for item in items {
        let price = item.unit_price();
        if price.is_sign_negative() {
            return Err(CheckoutError::Validation(format!(
                "unit price cannot be negative: {}",
                price
            )));
        }
        sum = currency
            .truncate(price)
            .checked_mul(Decimal::from(item.quantity()))
            .and_then(|line| sum.checked_add(line))
            .ok_or_else(|| CheckoutError::Validation("order total overflows".to_string()))?;
    }
    Ok(sum)
}

/// Total of bare amounts in `currency`, each truncated before summing
pub fn total_from_amounts(currency: Currency, amounts: &[Decimal]) -> CheckoutResult<Decimal> {
    if amounts.is_empty() {
        return Err(CheckoutError::EmptyItemSet);
    }

    let mut sum = Decimal::ZERO;
    for amount in amounts {
        if amount.is_sign_negative() {
            return Err(CheckoutError::Validation(format!(
                "amount cannot be negative: {}",
                amount
            )));
        }
        sum = sum.checked_add(currency.truncate(*amount)).ok_or_else(|| {
            CheckoutError::MalformedTransaction("captured amounts overflow".to_string())
        })?;
    }
    Ok(sum)
}
