//! # Access Token Cache
//!
//! OAuth2 client-credentials tokens are shared by every request. The cache
//! holds the current token as an `Arc` behind a lock and swaps it wholesale
//! on refresh; refreshes are single-flight behind an async mutex, so callers
//! arriving while a fetch is in progress wait for it and reuse its result.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use shop_core::{CheckoutError, CheckoutResult};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub scope: String,
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub app_id: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

/// A bearer token with its absolute expiry
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub scope: String,
    pub token_type: String,
    pub app_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Stamp a token response with `now + expires_in`.
    ///
    /// Fails when `expires_in` does not fit a timestamp.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> CheckoutResult<Self> {
        let expires_at = Duration::try_seconds(response.expires_in)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or_else(|| {
                CheckoutError::Serialization(format!(
                    "token expires_in out of range: {}",
                    response.expires_in
                ))
            })?;

        Ok(Self {
            token: SecretString::from(response.access_token),
            scope: response.scope,
            token_type: response.token_type,
            app_id: response.app_id,
            expires_at,
        })
    }

    /// Valid while the expiry is strictly in the future
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

#[derive(Debug, Default)]
pub struct TokenCache {
    current: RwLock<Option<Arc<AccessToken>>>,
    refresh: Mutex<()>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached token, if it has not expired
    pub fn current(&self) -> Option<Arc<AccessToken>> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|token| token.is_valid_at(Utc::now()))
            .cloned()
    }

    fn replace(&self, token: Arc<AccessToken>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(token);
    }

    /// Return the cached token or run `fetch` to replace it.
    ///
    /// At most one `fetch` runs at a time. A failed fetch leaves the previous
    /// value in place and is returned only to the caller that ran it.
    pub async fn get_or_refresh<F, Fut>(&self, fetch: F) -> CheckoutResult<Arc<AccessToken>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CheckoutResult<AccessToken>>,
    {
        if let Some(token) = self.current() {
            return Ok(token);
        }

        let _refresh = self.refresh.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.current() {
            debug!("Reusing token refreshed by a concurrent caller");
            return Ok(token);
        }

        let token = Arc::new(fetch().await?);
        info!(expires_at = %token.expires_at, app_id = %token.app_id, "Access token refreshed");
        self.replace(token.clone());

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn response(value: &str, expires_in: i64) -> TokenResponse {
        TokenResponse {
            scope: "https://uri.paypal.com/services/payments/payment".into(),
            access_token: value.into(),
            token_type: "Bearer".into(),
            app_id: "APP-80W284485P519543T".into(),
            expires_in,
        }
    }

    fn token(value: &str, expires_in: i64) -> AccessToken {
        AccessToken::from_response(response(value, expires_in), Utc::now()).unwrap()
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        for expires_in in [i64::MAX, i64::MIN] {
            let err = AccessToken::from_response(response("A21AA", expires_in), Utc::now())
                .unwrap_err();
            assert!(matches!(err, CheckoutError::Serialization(_)));
        }
    }

    #[test]
    fn test_expiry_is_strict() {
        let now = Utc::now();
        let mut t = token("A21AA", 0);
        t.expires_at = now;
        assert!(!t.is_valid_at(now));
        assert!(t.is_valid_at(now - Duration::seconds(1)));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_fetch() {
        let cache = TokenCache::new();
        let counter = AtomicUsize::new(0);
        let fetches = &counter;

        let fetch = move || async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(token("A21AA-shared", 3600))
        };

        let (a, b) = tokio::join!(cache.get_or_refresh(fetch), cache.get_or_refresh(fetch));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn test_expired_token_is_replaced() {
        let cache = TokenCache::new();
        cache.replace(Arc::new(token("old", -10)));
        assert!(cache.current().is_none());

        let fresh = cache
            .get_or_refresh(|| async { Ok(token("new", 3600)) })
            .await
            .unwrap();
        assert_eq!(fresh.token.expose_secret(), "new");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_value() {
        let cache = TokenCache::new();
        cache.replace(Arc::new(token("old", -10)));

        let result = cache
            .get_or_refresh(|| async { Err(CheckoutError::GatewayUnavailable("down".into())) })
            .await;
        assert!(result.is_err());

        let kept = cache.current.read().unwrap().clone().unwrap();
        assert_eq!(kept.token.expose_secret(), "old");
    }
}
