//! Dashboard view model.
//!
//! A [`DashboardView`] lives for one page load: it fetches the outlier list
//! exactly once, then re-derives the visible cards from the held list whenever
//! the filter or sort changes. Nothing here triggers a second fetch.
//!
//! The rendered page carries every fetched card (see [`DashboardView::grid`])
//! and its inline script re-applies the same filter, ordering and debounce in
//! the browser. The types here are the reference for that script: a change to
//! the rules belongs in both places.
//!
//! Search input should go through a [`Debouncer`] so the list is re-derived
//! only once typing pauses:
//!
//! ```rust,no_run
//! # use nichefire::dashboard::{Debouncer, DashboardView};
//! # use std::time::Duration;
//! # async fn wire(view: &mut DashboardView) {
//! let (mut search, mut applied) = Debouncer::new(String::new(), Duration::from_millis(300));
//! search.push("ca".to_string());
//! search.push("cat".to_string());
//! applied.changed().await.ok();
//! view.set_filter(&applied.borrow());
//! # }
//! ```

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::catalog::{compare_desc, derive_view, matches_filter, LinkTemplates, VideoCard};
use crate::models::{SortKey, SortSelector, Video};
use crate::outliers::OutlierSource;

/// Shown instead of the grid when the fetch fails. Details go to the log.
pub const FETCH_FAILED: &str = "Failed to load data. Is the backend API running?";

/// Publishes the last pushed value once no new value has arrived for `delay`.
///
/// Each [`push`](Debouncer::push) cancels the pending timer and starts a new
/// one, so intermediate values are never published.
pub struct Debouncer<T> {
    delay: Duration,
    tx: Arc<watch::Sender<T>>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + Sync + 'static> Debouncer<T> {
    pub fn new(initial: T, delay: Duration) -> (Self, watch::Receiver<T>) {
        let (tx, rx) = watch::channel(initial);
        let debouncer = Self {
            delay,
            tx: Arc::new(tx),
            pending: None,
        };
        (debouncer, rx)
    }

    pub fn push(&mut self, value: T) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
        let tx = self.tx.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tx.send_replace(value);
        }));
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Loading,
    Loaded(Vec<Video>),
    Failed(String),
}

/// What the page should render right now.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardContent {
    Loading,
    Error(String),
    NoResults,
    Cards(Vec<VideoCard>),
}

/// One card in the rendered grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridEntry<'a> {
    pub video: &'a Video,
    pub card: VideoCard,
    /// Index in the fetched list; the browser breaks ties on it.
    pub position: usize,
    /// Whether the current filter keeps this card.
    pub visible: bool,
}

pub struct DashboardView {
    state: LoadState,
    filter: String,
    sort: SortSelector,
    links: LinkTemplates,
    fetch_started: bool,
    mounted: bool,
}

impl DashboardView {
    pub fn new(links: LinkTemplates, sort: SortKey) -> Self {
        Self {
            state: LoadState::Loading,
            filter: String::new(),
            sort: sort.selector(),
            links,
            fetch_started: false,
            mounted: true,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn sort(&self) -> SortSelector {
        self.sort
    }

    /// Performs the view's single fetch. Later calls are no-ops.
    pub async fn load(&mut self, source: &dyn OutlierSource) {
        if self.fetch_started {
            return;
        }
        self.fetch_started = true;
        let result = source.fetch().await;
        if let Err(e) = &result {
            tracing::error!(source = %source.describe(), error = %e, "outlier fetch failed");
        }
        self.finish_load(result);
    }

    /// Stores a fetch outcome unless the view has been torn down.
    pub fn finish_load(&mut self, result: Result<Vec<Video>>) {
        if !self.mounted {
            tracing::debug!("discarding outlier response for unmounted dashboard");
            return;
        }
        self.state = match result {
            Ok(videos) => LoadState::Loaded(videos),
            Err(_) => LoadState::Failed(FETCH_FAILED.to_string()),
        };
    }

    pub fn unmount(&mut self) {
        self.mounted = false;
    }

    /// Sets the already-debounced filter text.
    pub fn set_filter(&mut self, filter: &str) {
        self.filter = filter.to_string();
    }

    pub fn set_sort(&mut self, key: SortKey) {
        self.sort = key.selector();
    }

    /// Videos in display order; empty until loaded.
    pub fn visible(&self) -> Vec<&Video> {
        match &self.state {
            LoadState::Loaded(videos) => derive_view(videos, &self.filter, self.sort.key),
            _ => Vec::new(),
        }
    }

    /// Every fetched video in sort order, flagged with the current filter.
    /// The visible entries are exactly [`visible`](Self::visible).
    pub fn grid(&self) -> Vec<GridEntry<'_>> {
        let LoadState::Loaded(videos) = &self.state else {
            return Vec::new();
        };
        let mut indexed: Vec<(usize, &Video)> = videos.iter().enumerate().collect();
        indexed.sort_by(|(_, a), (_, b)| compare_desc(a, b, self.sort.key));
        indexed
            .into_iter()
            .map(|(position, video)| GridEntry {
                video,
                card: VideoCard::new(video, &self.links),
                position,
                visible: matches_filter(video, &self.filter),
            })
            .collect()
    }

    pub fn content(&self) -> DashboardContent {
        match &self.state {
            LoadState::Loading => DashboardContent::Loading,
            LoadState::Failed(msg) => DashboardContent::Error(msg.clone()),
            LoadState::Loaded(_) => {
                let visible = self.visible();
                if visible.is_empty() {
                    DashboardContent::NoResults
                } else {
                    DashboardContent::Cards(
                        visible
                            .into_iter()
                            .map(|v| VideoCard::new(v, &self.links))
                            .collect(),
                    )
                }
            }
        }
    }
}
