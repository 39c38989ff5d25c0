//! Publishing API configuration records.
//!
//! At most one configuration is active at a time. Secrets are stored as
//! given and only leave the service through [`ApiConfigurationView`], which
//! masks them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ConfigId;

/// Default privacy applied to published videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyStatus {
    Public,
    #[default]
    Unlisted,
    Private,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Public => "public",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Private => "private",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "public" => PrivacyStatus::Public,
            "private" => PrivacyStatus::Private,
            _ => PrivacyStatus::Unlisted,
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored credential set for the publishing platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ApiConfiguration {
    pub id: ConfigId,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub channel_id: String,
    #[serde(default)]
    pub default_privacy: PrivacyStatus,
    #[serde(default)]
    pub is_active: bool,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl ApiConfiguration {
    /// Build a new record from input. Activation is left to the store.
    pub fn from_input(input: ApiConfigurationInput, now: DateTime<Utc>) -> Self {
        Self {
            id: ConfigId::new(),
            client_id: input.client_id.trim().to_string(),
            client_secret: input.client_secret,
            refresh_token: input.refresh_token.filter(|t| !t.is_empty()),
            channel_id: input.channel_id.trim().to_string(),
            default_privacy: input.default_privacy,
            is_active: false,
            created_date: now,
            updated_date: now,
        }
    }

    /// Replace the editable fields, keeping id and creation date.
    pub fn apply(&mut self, input: ApiConfigurationInput, now: DateTime<Utc>) {
        self.client_id = input.client_id.trim().to_string();
        self.client_secret = input.client_secret;
        self.refresh_token = input.refresh_token.filter(|t| !t.is_empty());
        self.channel_id = input.channel_id.trim().to_string();
        self.default_privacy = input.default_privacy;
        self.updated_date = now;
    }
}

/// Request body for creating or updating a configuration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiConfigurationInput {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub channel_id: String,
    #[serde(default)]
    pub default_privacy: PrivacyStatus,
}

impl ApiConfigurationInput {
    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.trim().is_empty() {
            return Err("Client ID is required".to_string());
        }
        if self.client_secret.is_empty() {
            return Err("Client secret is required".to_string());
        }
        if self.channel_id.trim().is_empty() {
            return Err("Channel ID is required".to_string());
        }
        Ok(())
    }
}

/// Configuration as returned to clients, with secrets masked.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiConfigurationView {
    pub id: ConfigId,
    pub client_id: String,
    pub client_secret: String,
    pub has_refresh_token: bool,
    pub channel_id: String,
    pub default_privacy: PrivacyStatus,
    pub is_active: bool,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl From<&ApiConfiguration> for ApiConfigurationView {
    fn from(config: &ApiConfiguration) -> Self {
        Self {
            id: config.id.clone(),
            client_id: config.client_id.clone(),
            client_secret: mask_secret(&config.client_secret),
            has_refresh_token: config.refresh_token.is_some(),
            channel_id: config.channel_id.clone(),
            default_privacy: config.default_privacy,
            is_active: config.is_active,
            created_date: config.created_date,
            updated_date: config.updated_date,
        }
    }
}

/// Keep the last four characters of a secret, star out the rest.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ApiConfigurationInput {
        ApiConfigurationInput {
            client_id: "client".to_string(),
            client_secret: "super-secret-value".to_string(),
            refresh_token: Some(String::new()),
            channel_id: "UC123".to_string(),
            default_privacy: PrivacyStatus::Private,
        }
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
    }

    #[test]
    fn test_view_hides_secret() {
        let config = ApiConfiguration::from_input(input(), Utc::now());
        let view = ApiConfigurationView::from(&config);
        assert!(!view.client_secret.contains("super"));
        assert!(!view.has_refresh_token);
        assert!(!view.is_active);
    }

    #[test]
    fn test_validate() {
        assert!(input().validate().is_ok());
        let mut bad = input();
        bad.channel_id = " ".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_privacy_default_is_unlisted() {
        let parsed: ApiConfigurationInput = serde_json::from_str(
            r#"{"client_id":"a","client_secret":"b","channel_id":"c"}"#,
        )
        .unwrap();
        assert_eq!(parsed.default_privacy, PrivacyStatus::Unlisted);
        assert_eq!(PrivacyStatus::from_str_lossy("weird"), PrivacyStatus::Unlisted);
    }
}
