//! OAuth2 authorization requests with PKCE
//!
//! The browser leg of the flow happens outside this crate. We build the
//! redirect URL, and hand the caller the `state` and PKCE verifier it must
//! keep until the platform redirects back with a code.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LinkcastError, Result};
use crate::platforms::Platform;

/// A pending authorization, to be completed with the returned code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub platform: Platform,
    pub url: String,
    pub redirect_uri: String,
    pub state: String,
    /// PKCE verifier; present when the platform requires PKCE
    pub code_verifier: Option<String>,
}

impl AuthorizationRequest {
    /// Build the authorization URL for `platform`
    pub fn new(platform: Platform, client_id: &str, redirect_uri: &str) -> Result<Self> {
        let config = platform.config();
        let state = random_token(32);
        let scope = config.scopes.join(" ");

        let mut params: Vec<(&str, String)> = vec![
            ("response_type", "code".to_string()),
            ("client_id", client_id.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("scope", scope),
            ("state", state.clone()),
        ];

        let code_verifier = if config.requires_pkce {
            let verifier = random_token(64);
            params.push(("code_challenge", code_challenge(&verifier)));
            params.push(("code_challenge_method", "S256".to_string()));
            Some(verifier)
        } else {
            None
        };

        let url = Url::parse_with_params(config.authorize_url, &params).map_err(|e| {
            LinkcastError::InvalidInput(format!("Invalid authorization URL: {}", e))
        })?;

        Ok(Self {
            platform,
            url: url.to_string(),
            redirect_uri: redirect_uri.to_string(),
            state,
            code_verifier,
        })
    }

    /// Compare the `state` echoed by the platform with ours
    pub fn verify_state(&self, returned_state: &str) -> Result<()> {
        if self.state == returned_state {
            Ok(())
        } else {
            Err(LinkcastError::InvalidInput(
                "OAuth state mismatch; restart the authorization".to_string(),
            ))
        }
    }
}

/// S256 challenge for a PKCE verifier (RFC 7636 section 4.2)
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
