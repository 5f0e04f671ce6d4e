//! Token provider implementations.
//!
//! 接続ハンドシェイクに使う資格情報の供給源。まずローカルキャッシュを
//! 参照し、なければ資格情報エンドポイントへ問い合わせる、という元の
//! モバイルクライアントの二段構えをそのまま踏襲しています。`None` は
//! 「再ログインが必要」を意味し、セッション側は自動再試行しません。

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::domain::{AuthToken, TokenProvider};

/// Refresh slightly before the advertised expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(30);

/// A fixed credential, for the CLI and for tests.
pub struct StaticTokenProvider {
    token: AuthToken,
}

impl StaticTokenProvider {
    pub fn new(token: AuthToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Option<AuthToken> {
        Some(self.token.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    /// Seconds until the access token expires
    expires_in: u64,
}

struct CachedToken {
    token: AuthToken,
    expires_at: Instant,
}

/// Credential source backed by an HTTP refresh endpoint.
///
/// `get_token` serves from the in-memory cache while the cached credential
/// is still fresh and only then falls back to the slower refresh call. Any
/// refresh failure is logged and reported as `None`; deciding what to do
/// about a lost login belongs to the caller.
pub struct HttpTokenProvider {
    http: reqwest::Client,
    token_url: String,
    refresh_token: String,
    cache: Mutex<Option<CachedToken>>,
}

impl HttpTokenProvider {
    /// Create a provider refreshing against the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `token_url` - Credential endpoint accepting a refresh token
    /// * `refresh_token` - Long-lived credential presented on refresh
    pub fn new(token_url: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token_url: token_url.into(),
            refresh_token: refresh_token.into(),
            cache: Mutex::new(None),
        }
    }

    async fn refresh(&self) -> Result<CachedToken, String> {
        let response = self
            .http
            .post(&self.token_url)
            .json(&RefreshRequest {
                refresh_token: &self.refresh_token,
            })
            .send()
            .await
            .map_err(|e| format!("refresh request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("refresh endpoint returned HTTP {status}"));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| format!("refresh response malformed: {e}"))?;

        let token =
            AuthToken::new(body.access_token).map_err(|e| format!("refresh token invalid: {e}"))?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_SLACK);

        Ok(CachedToken {
            token,
            expires_at: Instant::now() + lifetime,
        })
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn get_token(&self) -> Option<AuthToken> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref() {
            if Instant::now() < cached.expires_at {
                tracing::debug!("serving cached credential");
                return Some(cached.token.clone());
            }
            tracing::debug!("cached credential expired");
        }

        match self.refresh().await {
            Ok(fresh) => {
                let token = fresh.token.clone();
                *cache = Some(fresh);
                tracing::info!("credential refreshed");
                Some(token)
            }
            Err(reason) => {
                tracing::warn!(reason = %reason, "credential refresh failed");
                *cache = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn spawn_token_endpoint(
        expires_in: u64,
        fail: bool,
    ) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let state = hits.clone();
        let app = Router::new().route(
            "/auth/token",
            post(move |State(hits): State<Arc<AtomicU32>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(axum::http::StatusCode::INTERNAL_SERVER_ERROR)
                } else {
                    Ok(Json(serde_json::json!({
                        "accessToken": "fresh-token",
                        "expiresIn": expires_in,
                    })))
                }
            })
            .with_state(state),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/auth/token"), hits)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_refresh() {
        // テスト項目: キャッシュが有効な間は再取得しない
        // given (前提条件):
        let (url, hits) = spawn_token_endpoint(3600, false).await;
        let provider = HttpTokenProvider::new(url, "refresh-1");

        // when (操作):
        let first = provider.get_token().await;
        let second = provider.get_token().await;

        // then (期待する結果):
        assert_eq!(first.unwrap().as_str(), "fresh-token");
        assert_eq!(second.unwrap().as_str(), "fresh-token");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refreshes_again() {
        // テスト項目: 失効したキャッシュは再取得される
        // given (前提条件): expiresIn がスラック以下なので即失効する
        let (url, hits) = spawn_token_endpoint(1, false).await;
        let provider = HttpTokenProvider::new(url, "refresh-1");

        // when (操作):
        let first = provider.get_token().await;
        let second = provider.get_token().await;

        // then (期待する結果):
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_failure_yields_none() {
        // テスト項目: 再取得に失敗したら None を返す
        // given (前提条件):
        let (url, hits) = spawn_token_endpoint(3600, true).await;
        let provider = HttpTokenProvider::new(url, "refresh-1");

        // when (操作):
        let token = provider.get_token().await;

        // then (期待する結果):
        assert!(token.is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_static_provider_returns_fixed_token() {
        // テスト項目: StaticTokenProvider は常に同じトークンを返す
        // given (前提条件):
        let token = AuthToken::new("fixed".to_string()).unwrap();
        let provider = StaticTokenProvider::new(token);

        // when (操作) / then (期待する結果):
        assert_eq!(provider.get_token().await.unwrap().as_str(), "fixed");
        assert_eq!(provider.get_token().await.unwrap().as_str(), "fixed");
    }
}
