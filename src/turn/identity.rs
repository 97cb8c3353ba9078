//! Bot identity claims and skill classification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claim names and well-known values
pub struct AuthenticationConstants;

impl AuthenticationConstants {
    pub const AUDIENCE_CLAIM: &'static str = "aud";
    pub const APP_ID_CLAIM: &'static str = "appid";
    pub const AUTHORIZED_PARTY: &'static str = "azp";
    pub const VERSION_CLAIM: &'static str = "ver";
    pub const ANONYMOUS_SKILL_APP_ID: &'static str = "AnonymousSkill";
    pub const TO_BOT_FROM_CHANNEL_TOKEN_ISSUER: &'static str = "https://api.botframework.com";
    pub const TO_CHANNEL_FROM_BOT_OAUTH_SCOPE: &'static str = "https://api.botframework.com";
    pub const GOVERNMENT_TO_CHANNEL_FROM_BOT_OAUTH_SCOPE: &'static str =
        "https://api.botframework.us";
}

/// Claims attached to the inbound request by the hosting adapter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsIdentity {
    pub claims: HashMap<String, String>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl ClaimsIdentity {
    pub fn new(claims: HashMap<String, String>, is_authenticated: bool) -> Self {
        Self {
            claims,
            is_authenticated,
        }
    }

    /// Build from `(type, value)` pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let claims = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(claims, true)
    }

    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .get(claim_type)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// App id of the caller; v1 tokens carry `appid`, v2 tokens `azp`
    pub fn app_id(&self) -> Option<&str> {
        match self.claim(AuthenticationConstants::VERSION_CLAIM) {
            Some("2.0") => self.claim(AuthenticationConstants::AUTHORIZED_PARTY),
            _ => self.claim(AuthenticationConstants::APP_ID_CLAIM),
        }
    }

    /// True when the claims were issued for a bot-to-bot (skill) call
    pub fn is_skill_claim(&self) -> bool {
        if self.claim(AuthenticationConstants::APP_ID_CLAIM)
            == Some(AuthenticationConstants::ANONYMOUS_SKILL_APP_ID)
        {
            return true;
        }

        if self.claim(AuthenticationConstants::VERSION_CLAIM).is_none() {
            return false;
        }

        let audience = match self.claim(AuthenticationConstants::AUDIENCE_CLAIM) {
            Some(aud) if aud != AuthenticationConstants::TO_BOT_FROM_CHANNEL_TOKEN_ISSUER => aud,
            _ => return false,
        };

        match self.app_id() {
            Some(app_id) => app_id != audience,
            None => false,
        }
    }
}
