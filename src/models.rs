//! Core data types shared by the data source, the views and the guard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A video record as returned by the outliers endpoint.
///
/// Engagement counts and the viral score are optional on the wire; a missing
/// or `null` value deserializes to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub creator_name: String,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub subscriber_count: Option<u64>,
    #[serde(default)]
    pub viral_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Video {
    /// Value used for ordering; absent fields count as zero.
    pub fn metric(&self, key: SortKey) -> f64 {
        match key {
            SortKey::ViralScore => self.viral_score.unwrap_or(0.0),
            SortKey::ViewCount => self.view_count.unwrap_or(0) as f64,
            SortKey::LikeCount => self.like_count.unwrap_or(0) as f64,
            SortKey::SubscriberCount => self.subscriber_count.unwrap_or(0) as f64,
        }
    }
}

/// The fixed set of fields the dashboard can sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    ViralScore,
    ViewCount,
    LikeCount,
    SubscriberCount,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [
        SortKey::ViralScore,
        SortKey::ViewCount,
        SortKey::LikeCount,
        SortKey::SubscriberCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::ViralScore => "viral_score",
            SortKey::ViewCount => "view_count",
            SortKey::LikeCount => "like_count",
            SortKey::SubscriberCount => "subscriber_count",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::ViralScore => "Viral Score",
            SortKey::ViewCount => "Views",
            SortKey::LikeCount => "Likes",
            SortKey::SubscriberCount => "Subscribers",
        }
    }

    pub fn selector(self) -> SortSelector {
        SortSelector {
            key: self,
            label: self.label(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown sort key '{}'. Must be viral_score, view_count, like_count, or subscriber_count.",
                    s
                )
            })
    }
}

/// Active sort choice together with its display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSelector {
    pub key: SortKey,
    pub label: &'static str,
}

impl Default for SortSelector {
    fn default() -> Self {
        SortKey::default().selector()
    }
}

/// The subset of the identity provider's user record this application reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

/// An authenticated session as resolved from an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub profile: Profile,
    pub expires_at: DateTime<Utc>,
}
