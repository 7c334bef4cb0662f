use crate::cli::GoogleOAuthConfig;
use crate::errors::AppError;
use anyhow::anyhow;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};
use url::Url;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity returned by Google once a code or ID token has been verified.
#[derive(Deserialize, Debug, Clone)]
pub struct GoogleProfile {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: Option<JsonValue>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

impl GoogleProfile {
    /// The userinfo endpoint reports a boolean, tokeninfo a string.
    pub fn is_email_verified(&self) -> bool {
        match &self.email_verified {
            Some(JsonValue::Bool(verified)) => *verified,
            Some(JsonValue::String(verified)) => verified == "true",
            _ => false,
        }
    }
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
}

pub struct GoogleOAuth {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn authorization_url(&self, state: &str) -> Result<Url, AppError> {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|err| AppError::InternalServerError(anyhow!("Invalid Google URL: {}", err)))
    }

    /// Trades an authorization code for an access token and reads the profile.
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleProfile, AppError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                "Google rejected authorization code with status {}",
                response.status()
            );
            return Err(AppError::Unauthorized(
                "Google rejected the authorization code".to_string(),
            ));
        }
        let token: TokenResponse = response.json().await?;
        debug!("Obtained Google access token");

        let profile = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<GoogleProfile>()
            .await?;

        Self::require_verified(profile)
    }

    /// Verifies a Google ID token and checks it was minted for this client.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<GoogleProfile, AppError> {
        let response = self
            .http
            .get(TOKENINFO_URL)
            .query(&[("id_token", id_token)])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Google tokeninfo rejected ID token: {}", response.status());
            return Err(AppError::Unauthorized("Invalid Google credential".to_string()));
        }
        let profile: GoogleProfile = response.json().await?;

        if profile.aud.as_deref() != Some(self.config.client_id.as_str()) {
            warn!(
                "Google ID token audience mismatch: {:?}",
                profile.aud.as_deref()
            );
            return Err(AppError::Unauthorized(
                "Google credential was issued for another client".to_string(),
            ));
        }

        Self::require_verified(profile)
    }

    fn require_verified(profile: GoogleProfile) -> Result<GoogleProfile, AppError> {
        if !profile.is_email_verified() {
            warn!("Google account {} has an unverified email", profile.sub);
            return Err(AppError::Unauthorized(
                "Google account email is not verified".to_string(),
            ));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> GoogleOAuthConfig {
        GoogleOAuthConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: Url::parse("http://localhost:3000/api/auth/google/callback").unwrap(),
        }
    }

    #[test]
    fn authorization_url_carries_client_and_state() {
        let google = GoogleOAuth::new(config());
        let url = google.authorization_url("abc").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".to_string(), "client-123".to_string())));
        assert!(pairs.contains(&("state".to_string(), "abc".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
    }

    #[test]
    fn email_verified_accepts_bool_and_string() {
        let from_userinfo: GoogleProfile =
            serde_json::from_value(json!({"sub": "1", "email": "a@b.c", "email_verified": true}))
                .unwrap();
        let from_tokeninfo: GoogleProfile = serde_json::from_value(
            json!({"sub": "1", "email": "a@b.c", "email_verified": "true"}),
        )
        .unwrap();
        let missing: GoogleProfile =
            serde_json::from_value(json!({"sub": "1", "email": "a@b.c"})).unwrap();
        assert!(from_userinfo.is_email_verified());
        assert!(from_tokeninfo.is_email_verified());
        assert!(!missing.is_email_verified());
    }
}
