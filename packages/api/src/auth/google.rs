//! # Google OAuth 2.0 sign-in
//!
//! Authorization Code flow with PKCE.
//!
//! 1. **[`authorize_url`](GoogleOAuth::authorize_url)** builds the consent-page URL
//!    requesting `openid`, `email` and `profile`, and remembers the CSRF state
//!    together with the PKCE verifier for ten minutes.
//! 2. **[`exchange_code`](GoogleOAuth::exchange_code)** is called by the
//!    `/api/auth/google/callback` route. It consumes the matching state entry,
//!    exchanges the code and verifier for an access token, and fetches the
//!    profile from the userinfo endpoint.
//!
//! Finding, linking or creating the local account from the returned
//! [`GoogleProfile`] is up to the caller.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::config::OAuthConfig;
use crate::error::AppError;
use crate::settings;

const STATE_TTL: Duration = Duration::from_secs(10 * 60);
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Google user info from API.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

struct PendingLogin {
    verifier: String,
    expires_at: Instant,
}

/// Google OAuth handler.
pub struct GoogleOAuth {
    config: OAuthConfig,
    pending: Mutex<HashMap<String, PendingLogin>>,
    http: Client,
}

impl GoogleOAuth {
    pub fn new(google: &settings::Google) -> Result<Self, String> {
        let config = OAuthConfig::google(google)?;
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            config,
            pending: Mutex::new(HashMap::new()),
            http,
        })
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Generate authorization URL with PKCE.
    pub async fn authorize_url(&self) -> String {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, csrf_state) = self
            .create_client()
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        let now = Instant::now();
        let mut pending = self.pending.lock().await;
        pending.retain(|_, login| login.expires_at > now);
        pending.insert(
            csrf_state.secret().clone(),
            PendingLogin {
                verifier: pkce_verifier.secret().clone(),
                expires_at: now + STATE_TTL,
            },
        );

        auth_url.to_string()
    }

    /// Exchange authorization code for tokens and get user info.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<GoogleProfile, AppError> {
        let verifier = {
            let mut pending = self.pending.lock().await;
            pending
                .remove(state)
                .filter(|login| login.expires_at > Instant::now())
                .map(|login| login.verifier)
                .ok_or_else(|| AppError::BadRequest("Invalid or expired OAuth state".into()))?
        };

        let token = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| AppError::BadRequest(format!("Google authentication failed: {e}")))?;

        self.http
            .get(USERINFO_URL)
            .bearer_auth(token.access_token().secret())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(AppError::internal)?
            .json::<GoogleProfile>()
            .await
            .map_err(AppError::internal)
    }

    #[cfg(test)]
    async fn pending_states(&self) -> usize {
        self.pending.lock().await.len()
    }
}
