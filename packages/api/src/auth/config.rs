//! OAuth configuration built from [`Settings`](crate::settings::Settings).

use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};

use crate::settings;

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
}

impl OAuthConfig {
    /// Google endpoints with the configured client credentials.
    pub fn google(google: &settings::Google) -> Result<Self, String> {
        if !google.is_configured() {
            return Err("Google OAuth client id and secret are not set".to_string());
        }

        Ok(Self {
            client_id: ClientId::new(google.id.clone()),
            client_secret: ClientSecret::new(google.secret.clone()),
            auth_url: AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())
                .map_err(|e| e.to_string())?,
            token_url: TokenUrl::new("https://oauth2.googleapis.com/token".to_string())
                .map_err(|e| e.to_string())?,
            redirect_url: RedirectUrl::new(google.redirect.clone()).map_err(|e| e.to_string())?,
        })
    }
}
