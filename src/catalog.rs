//! Filtering, ordering and card presentation for the outlier list.
//!
//! Everything here is a pure function of its inputs: the displayed list is
//! derived from `(fetched videos, filter text, sort key)` and nothing else.
//!
//! # Ordering
//!
//! Sorting is descending by the selected metric with absent and NaN values
//! counted as zero. `slice::sort_by` is a stable merge sort, so videos with
//! equal metrics keep the order in which the data source returned them.

use std::cmp::Ordering;

use crate::config::DashboardConfig;
use crate::models::{SortKey, Video};

/// Returns the videos whose title or creator name contains `filter`,
/// ignoring case. An empty filter matches everything.
pub fn filter_videos<'a>(videos: &'a [Video], filter: &str) -> Vec<&'a Video> {
    if filter.is_empty() {
        return videos.iter().collect();
    }
    let needle = filter.to_lowercase();
    videos
        .iter()
        .filter(|v| matches_needle(v, &needle))
        .collect()
}

/// Whether `video` passes the filter.
pub fn matches_filter(video: &Video, filter: &str) -> bool {
    filter.is_empty() || matches_needle(video, &filter.to_lowercase())
}

fn matches_needle(video: &Video, needle: &str) -> bool {
    video.title.to_lowercase().contains(needle)
        || video.creator_name.to_lowercase().contains(needle)
}

/// Descending comparison by `key`. NaN counts as zero, which keeps the
/// ordering total.
pub fn compare_desc(a: &Video, b: &Video, key: SortKey) -> Ordering {
    sort_value(b, key).total_cmp(&sort_value(a, key))
}

fn sort_value(video: &Video, key: SortKey) -> f64 {
    let m = video.metric(key);
    if m.is_nan() {
        0.0
    } else {
        m
    }
}

/// Stable descending sort by `key`.
pub fn sort_videos(videos: &mut [&Video], key: SortKey) {
    videos.sort_by(|a, b| compare_desc(a, b, key));
}

/// Filtered and sorted view over the fetched list.
pub fn derive_view<'a>(videos: &'a [Video], filter: &str, key: SortKey) -> Vec<&'a Video> {
    let mut view = filter_videos(videos, filter);
    sort_videos(&mut view, key);
    view
}

/// Compact count: `1.2M`, `3.4K`, `999`, `0`.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Badge text for the viral score. Zero and absent scores show `N/A`.
pub fn viral_badge(score: Option<f64>) -> String {
    match score {
        Some(s) if s != 0.0 && s.is_finite() => format!("{:.0}", s),
        _ => "N/A".to_string(),
    }
}

/// URL bases used to turn a video id into links.
#[derive(Debug, Clone)]
pub struct LinkTemplates {
    pub video_url_base: String,
    pub thumbnail_url_base: String,
    pub fallback_thumbnail: String,
}

impl Default for LinkTemplates {
    fn default() -> Self {
        Self::from(&DashboardConfig::default())
    }
}

impl From<&DashboardConfig> for LinkTemplates {
    fn from(cfg: &DashboardConfig) -> Self {
        Self {
            video_url_base: cfg.video_url_base.trim_end_matches('/').to_string(),
            thumbnail_url_base: cfg.thumbnail_url_base.trim_end_matches('/').to_string(),
            fallback_thumbnail: cfg.fallback_thumbnail.clone(),
        }
    }
}

impl LinkTemplates {
    pub fn video_url(&self, video_id: &str) -> String {
        format!("{}/{}", self.video_url_base, video_id)
    }

    /// The thumbnail is always derived from the id; the record's own
    /// `thumbnail_url` is not trusted.
    pub fn thumbnail_url(&self, video_id: &str) -> String {
        format!("{}/{}/hqdefault.jpg", self.thumbnail_url_base, video_id)
    }
}

/// Display-ready card for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCard {
    pub video_id: String,
    pub title: String,
    pub creator_name: String,
    pub href: String,
    pub thumbnail: String,
    pub fallback_thumbnail: String,
    pub badge: String,
    pub views: String,
    pub likes: String,
    pub subscribers: String,
}

impl VideoCard {
    pub fn new(video: &Video, links: &LinkTemplates) -> Self {
        Self {
            video_id: video.video_id.clone(),
            title: video.title.clone(),
            creator_name: video.creator_name.clone(),
            href: links.video_url(&video.video_id),
            thumbnail: links.thumbnail_url(&video.video_id),
            fallback_thumbnail: links.fallback_thumbnail.clone(),
            badge: viral_badge(video.viral_score),
            views: format_count(video.view_count.unwrap_or(0)),
            likes: format_count(video.like_count.unwrap_or(0)),
            subscribers: format_count(video.subscriber_count.unwrap_or(0)),
        }
    }
}
