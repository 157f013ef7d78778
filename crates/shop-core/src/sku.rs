//! # SKU Codec
//!
//! A SKU packs a product and one option combination into a short key such as
//! `TS-SM-RD-1`. The letters are a human-readable hint derived from the
//! product name and option labels; the numeric suffix after the last `-` is
//! the product id and is the only part [`Sku::product_id`] trusts.
//!
//! Two differently named options may reduce to the same two-letter token.

use crate::error::{CheckoutError, CheckoutResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stock-keeping-unit key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Wrap an existing key without validating it
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the SKU for a product name, its option labels and its id
    pub fn encode<S: AsRef<str>>(
        product_name: &str,
        option_labels: &[S],
        product_id: u64,
    ) -> CheckoutResult<Self> {
        if product_id == 0 {
            return Err(CheckoutError::InvalidSku(
                "product id must be greater than zero".to_string(),
            ));
        }

        let mut prefix = sku_token(product_name);
        for label in option_labels {
            prefix.push('-');
            prefix.push_str(&sku_token(label.as_ref()));
        }

        if prefix.len() <= 1 {
            return Err(CheckoutError::InvalidSku(format!(
                "prefix '{}' is too short",
                prefix
            )));
        }

        Ok(Self(format!("{}-{}", prefix, product_id)))
    }

    /// Decode the product id from the numeric suffix
    pub fn product_id(&self) -> CheckoutResult<u64> {
        let bytes = self.0.as_bytes();
        if bytes.len() <= 1 {
            return Err(CheckoutError::InvalidSku(format!(
                "'{}' is too short",
                self.0
            )));
        }

        let last = bytes[bytes.len() - 1];
        if !last.is_ascii_digit() {
            return Err(CheckoutError::InvalidSku(format!(
                "'{}' cannot end with '{}'",
                self.0, last as char
            )));
        }

        let mut separator = None;
        for i in (0..bytes.len()).rev() {
            if bytes[i] == b'-' {
                separator = Some(i);
                break;
            }
            if !bytes[i].is_ascii_digit() {
                return Err(CheckoutError::InvalidSku(format!(
                    "suffix of '{}' must be digits, got '{}'",
                    self.0, bytes[i] as char
                )));
            }
            if i == 0 {
                break;
            }
        }

        let separator = separator.ok_or_else(|| {
            CheckoutError::InvalidSku(format!("'{}' has no product id separator", self.0))
        })?;

        self.0[separator + 1..].parse().map_err(|_| {
            CheckoutError::InvalidSku(format!("product id of '{}' is out of range", self.0))
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Sku {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Sku {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Reduce a name or option label to its two-letter token.
///
/// Labels of at most two bytes are kept verbatim.
fn sku_token(label: &str) -> String {
    if label.len() <= 2 {
        return label.to_string();
    }

    let token: String = label
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .filter(|c| c.is_ascii_uppercase() && !matches!(c, 'A' | 'E' | 'I' | 'O' | 'U'))
        .take(2)
        .collect();

    if token.len() < 2 {
        return label.chars().take(2).collect();
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_tokens() {
        let sku = Sku::encode("T-shirt", &["Small", "Red"], 1).unwrap();
        assert_eq!(sku.as_str(), "TS-SM-RD-1");

        let sku = Sku::encode("Mug", &["XL"], 42).unwrap();
        assert_eq!(sku.as_str(), "MG-XL-42");
    }

    #[test]
    fn test_encode_falls_back_to_raw_chars() {
        // "Aeiou" has no consonants left after filtering
        assert_eq!(sku_token("Aeiou"), "Ae");
        assert_eq!(sku_token("Ox"), "Ox");
        assert_eq!(sku_token("a1e"), "a1");
    }

    #[test]
    fn test_encode_rejects_bad_input() {
        assert!(Sku::encode("Hat", &["Blue"], 0).is_err());
        assert!(Sku::encode("", &[] as &[&str], 3).is_err());
    }

    #[test]
    fn test_decode_round_trip() {
        let cases: [(&str, &[&str], u64); 3] = [
            ("T-shirt", &["Small", "Red"], 1),
            ("Hoodie", &["Large"], 907),
            ("Sticker pack", &[], 12),
        ];
        for (name, options, id) in cases {
            let sku = Sku::encode(name, options, id).unwrap();
            assert_eq!(sku.product_id().unwrap(), id, "sku {}", sku);
        }
    }

    #[test]
    fn test_decode_valid() {
        assert_eq!(Sku::from("T-1").product_id().unwrap(), 1);
        assert_eq!(Sku::from("TS-SM-RD-1").product_id().unwrap(), 1);
        assert_eq!(Sku::from("-77").product_id().unwrap(), 77);
    }

    #[test]
    fn test_decode_invalid() {
        for raw in ["", "1", "T-", "TX", "12", "T-1a", "T-x1", "TS-SM-R1"] {
            let err = Sku::from(raw).product_id().unwrap_err();
            assert!(matches!(err, CheckoutError::InvalidSku(_)), "raw {:?}", raw);
        }
    }

    #[test]
    fn test_decode_overflow() {
        let sku = Sku::from("T-99999999999999999999999");
        assert!(sku.product_id().is_err());
    }
}
