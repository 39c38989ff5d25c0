//! Title/description/hashtag metadata records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::MetadataId;

/// Maximum title length accepted by the publishing platform.
pub const MAX_TITLE_LEN: usize = 100;

/// Maximum description length accepted by the publishing platform.
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// Metadata that can be bound to exactly one queue entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Metadata {
    pub id: MetadataId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    pub created_date: DateTime<Utc>,

    /// Set once the record is bound into a queue entry; never reset
    #[serde(default)]
    pub is_used: bool,

    /// Monotonic creation order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,
}

impl Metadata {
    /// Build a new unused record from a validated create request.
    pub fn from_create(input: MetadataCreate, sequence_number: i64) -> Self {
        Self {
            id: MetadataId::new(),
            title: input.title.trim().to_string(),
            description: input.description,
            hashtags: normalize_hashtags(&input.hashtags),
            created_date: Utc::now(),
            is_used: false,
            sequence_number: Some(sequence_number),
        }
    }
}

/// Request body for creating metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MetadataCreate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl MetadataCreate {
    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(format!("Title must be at most {} characters", MAX_TITLE_LEN));
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ));
        }
        Ok(())
    }
}

/// Request body for bulk metadata creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct MetadataBulkCreate(pub Vec<MetadataCreate>);

impl MetadataBulkCreate {
    /// Validate every entry, reporting the first failing position (1-based).
    pub fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() {
            return Err("At least one metadata entry is required".to_string());
        }
        for (i, entry) in self.0.iter().enumerate() {
            entry
                .validate()
                .map_err(|e| format!("Entry {}: {}", i + 1, e))?;
        }
        Ok(())
    }
}

/// Trim hashtags, drop empties and duplicates while keeping input order.
///
/// A leading `#` is kept as given, so `#rust` and `rust` stay distinct.
pub fn normalize_hashtags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|t| t == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}
