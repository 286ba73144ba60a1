//! Bearer tokens shared by the calls of a [`Dispatcher`](crate::Dispatcher).
//!
//! The [`TokenStore`] keeps the current [`AuthContext`] together with a
//! generation counter bumped on every rotation. That state lock is never held
//! across an `.await`, so reading the token never waits on a refresh.
//!
//! Refreshes are serialized by a separate gate: concurrent callers that all saw
//! the same expired token trigger a single call to the [`TokenRefresher`], and
//! the others observe the new generation and reuse its token. A refresher may
//! issue calls through the same dispatcher; a `401` on those calls is returned
//! as is instead of waiting for the refresh it belongs to. Calls made from a
//! task spawned by the refresher are not recognized as such.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Result;

/// Access and refresh tokens of the authenticated session.
///
/// An empty access token means requests are sent without `Authorization`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    /// Bearer token sent with every context-bound call.
    pub access_token: String,
    /// Token handed to the [`TokenRefresher`].
    pub refresh_token: String,
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(token: &str) -> &'static str {
            if token.is_empty() { "" } else { "<redacted>" }
        }
        f.debug_struct("AuthContext")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .finish()
    }
}

/// Tokens returned by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// New access token.
    pub access_token: String,
    /// New refresh token, when the server rotates it.
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Pair with a new access token, keeping the current refresh token.
    #[must_use]
    pub fn access(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
        }
    }
}

/// Future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenPair>> + Send + 'a>>;

/// Exchanges a refresh token for a new access token.
///
/// Implemented for any `Fn(String) -> impl Future<Output = Result<TokenPair>>`.
///
/// # Example
///
/// ```ignore
/// dispatcher
///     .set_refresher(|refresh_token: String| async move {
///         let pair = my_auth_server.exchange(&refresh_token).await?;
///         Ok(courier::TokenPair::access(pair.access_token))
///     })
///     .await;
/// ```
pub trait TokenRefresher: Send + Sync {
    /// Obtain fresh tokens from `refresh_token`.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a>;
}

impl<F, Fut> TokenRefresher for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TokenPair>> + Send + 'static,
{
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> RefreshFuture<'a> {
        Box::pin(self(refresh_token.to_string()))
    }
}

tokio::task_local! {
    static REFRESHING: ();
}

struct TokenState {
    auth: AuthContext,
    generation: u64,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

/// Shared, async-safe token storage.
#[derive(Clone)]
pub struct TokenStore {
    state: Arc<Mutex<TokenState>>,
    gate: Arc<Mutex<()>>,
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(AuthContext::default())
    }
}

impl TokenStore {
    /// Store holding `auth`, without refresher.
    #[must_use]
    pub fn new(auth: AuthContext) -> Self {
        Self {
            state: Arc::new(Mutex::new(TokenState {
                auth,
                generation: 0,
                refresher: None,
            })),
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Current tokens.
    pub async fn auth(&self) -> AuthContext {
        self.state.lock().await.auth.clone()
    }

    /// Current access token, empty when unauthenticated.
    pub async fn access_token(&self) -> String {
        self.state.lock().await.auth.access_token.clone()
    }

    /// Current access token with the generation it belongs to.
    pub async fn snapshot(&self) -> (String, u64) {
        let state = self.state.lock().await;
        (state.auth.access_token.clone(), state.generation)
    }

    /// Replace the access token.
    pub async fn set_access_token(&self, token: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.auth.access_token = token.into();
        state.generation += 1;
    }

    /// Replace the refresh token.
    pub async fn set_refresh_token(&self, token: impl Into<String>) {
        self.state.lock().await.auth.refresh_token = token.into();
    }

    /// Replace both tokens.
    pub async fn set_auth(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.auth = AuthContext {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        };
        state.generation += 1;
    }

    /// Install the refresher used when a token is rejected.
    pub async fn set_refresher(&self, refresher: impl TokenRefresher + 'static) {
        self.state.lock().await.refresher = Some(Arc::new(refresher));
    }

    /// Refresh the access token unless it already changed since `seen_generation`.
    ///
    /// Returns the current access token when another caller rotated it in the
    /// meantime, when no refresher is installed, or when called from within
    /// the refresher itself.
    ///
    /// # Errors
    ///
    /// Propagates the refresher's error; the stored tokens are left untouched.
    pub async fn refresh(&self, seen_generation: u64) -> Result<String> {
        if REFRESHING.try_with(|_| ()).is_ok() {
            debug!("token rejected while refreshing, not refreshing again");
            return Ok(self.access_token().await);
        }

        let _gate = self.gate.lock().await;
        let (refresher, refresh_token) = {
            let state = self.state.lock().await;
            if state.generation != seen_generation {
                debug!("access token already rotated, reusing it");
                return Ok(state.auth.access_token.clone());
            }
            let Some(refresher) = state.refresher.clone() else {
                debug!("no token refresher installed");
                return Ok(state.auth.access_token.clone());
            };
            (refresher, state.auth.refresh_token.clone())
        };

        let pair = REFRESHING.scope((), refresher.refresh(&refresh_token)).await?;

        let mut state = self.state.lock().await;
        state.auth.access_token = pair.access_token;
        if let Some(refresh_token) = pair.refresh_token {
            state.auth.refresh_token = refresh_token;
        }
        state.generation += 1;
        info!(generation = state.generation, "access token refreshed");

        Ok(state.auth.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use assert2::{check, let_assert};

    use super::*;
    use crate::Error;

    fn counting_refresher(calls: Arc<AtomicUsize>) -> impl TokenRefresher {
        move |refresh_token: String| {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(TokenPair {
                    access_token: format!("access-{n}"),
                    refresh_token: Some(format!("{refresh_token}+{n}")),
                })
            }
        }
    }

    #[test]
    fn auth_context_debug_redacts_tokens() {
        let auth = AuthContext {
            access_token: "secret".to_string(),
            refresh_token: String::new(),
        };
        let debug = format!("{auth:?}");
        check!(!debug.contains("secret"));
        check!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn setters_update_tokens() {
        let store = TokenStore::default();
        check!(store.access_token().await.is_empty());

        store.set_access_token("a1").await;
        store.set_refresh_token("r1").await;
        check!(store.auth().await == AuthContext { access_token: "a1".into(), refresh_token: "r1".into() });

        store.set_auth("a2", "r2").await;
        let (token, generation) = store.snapshot().await;
        check!(token == "a2");
        check!(generation == 2);
    }

    #[tokio::test]
    async fn refresh_without_refresher_returns_current_token() {
        let store = TokenStore::new(AuthContext {
            access_token: "current".into(),
            refresh_token: "r".into(),
        });

        let token = store.refresh(0).await.expect("refresh");
        check!(token == "current");
        check!(store.snapshot().await.1 == 0);
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = TokenStore::new(AuthContext {
            access_token: "expired".into(),
            refresh_token: "r".into(),
        });
        store.set_refresher(counting_refresher(Arc::clone(&calls))).await;

        let token = store.refresh(0).await.expect("refresh");

        check!(token == "access-1");
        check!(store.auth().await.refresh_token == "r+1");
        check!(calls.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn concurrent_refreshes_run_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = TokenStore::new(AuthContext {
            access_token: "expired".into(),
            refresh_token: "r".into(),
        });
        store.set_refresher(counting_refresher(Arc::clone(&calls))).await;
        let (_, seen) = store.snapshot().await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.refresh(seen).await })
            })
            .collect();

        for task in tasks {
            let token = task.await.expect("join").expect("refresh");
            check!(token == "access-1");
        }
        check!(calls.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn token_is_readable_while_refreshing() {
        let store = TokenStore::new(AuthContext {
            access_token: "expired".into(),
            refresh_token: "r".into(),
        });
        let reader = store.clone();
        store
            .set_refresher(move |_refresh_token: String| {
                let reader = reader.clone();
                async move {
                    let (token, _) = reader.snapshot().await;
                    Ok::<_, Error>(TokenPair::access(format!("{token}-renewed")))
                }
            })
            .await;

        let token = tokio::time::timeout(Duration::from_secs(1), store.refresh(0))
            .await
            .expect("refresh does not block token reads")
            .expect("refresh");
        check!(token == "expired-renewed");
    }

    #[tokio::test]
    async fn nested_refresh_returns_current_token() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let store = TokenStore::new(AuthContext {
            access_token: "expired".into(),
            refresh_token: "r".into(),
        });
        let nested = store.clone();
        store
            .set_refresher(move |_refresh_token: String| {
                let nested = nested.clone();
                counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    let inner = nested.refresh(0).await?;
                    Ok::<_, Error>(TokenPair::access(format!("{inner}-renewed")))
                }
            })
            .await;

        let token = tokio::time::timeout(Duration::from_secs(1), store.refresh(0))
            .await
            .expect("nested refresh does not wait on itself")
            .expect("refresh");
        check!(token == "expired-renewed");
        check!(calls.load(Ordering::SeqCst) == 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_tokens() {
        let store = TokenStore::new(AuthContext {
            access_token: "expired".into(),
            refresh_token: "r".into(),
        });
        store
            .set_refresher(|_refresh_token: String| async {
                Err::<TokenPair, _>(Error::http(400, "invalid_grant"))
            })
            .await;

        let_assert!(Err(err) = store.refresh(0).await);
        check!(err.message() == "invalid_grant");
        check!(store.snapshot().await == ("expired".to_string(), 0));
    }
}
