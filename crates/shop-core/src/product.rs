//! # Product Catalog
//!
//! Products and their option combinations, loaded from `config/catalog.toml`.
//! Combination SKUs are not written in the file; they are derived from the
//! product name, the option labels and the product id.

use crate::error::{CheckoutError, CheckoutResult};
use crate::money::Currency;
use crate::order::Combination;
use crate::sku::Sku;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One option combination as written in the catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationSpec {
    /// Option labels, e.g. `["Small", "Red"]`
    #[serde(default)]
    pub options: Vec<String>,

    /// Unit price, written as a string to keep it exact
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,

    #[serde(default)]
    pub currency: Currency,

    pub stock: u32,
}

/// A product in the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Store-assigned product id, encoded into every SKU
    pub id: u64,

    /// Display name
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub combinations: Vec<CombinationSpec>,
}

impl Product {
    /// Resolve every combination to its SKU-keyed form
    pub fn combinations(&self) -> CheckoutResult<Vec<Combination>> {
        self.combinations
            .iter()
            .map(|entry| {
                if entry.price.is_sign_negative() {
                    return Err(CheckoutError::Validation(format!(
                        "product {} has a negative price",
                        self.id
                    )));
                }
                Ok(Combination {
                    sku: Sku::encode(&self.name, &entry.options, self.id)?,
                    price: entry.price,
                    currency: entry.currency,
                    stock: entry.stock,
                    options: entry.options.clone(),
                })
            })
            .collect()
    }
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Find a product by id
    pub fn get(&self, id: u64) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> CheckoutResult<Self> {
        toml::from_str(toml_str).map_err(|e| CheckoutError::Configuration(e.to_string()))
    }
}
