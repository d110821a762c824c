//! Subscribe view model: billing widget lifecycle and the checkout state machine.
//!
//! ```text
//! Idle ──initialize──▶ InitializingProvider ──ok──▶ Ready ──subscribe──▶ Submitting
//!   │                        │                        ▲                     │
//!   │ (no token)             └──err──▶ ProviderUnavailable                  ├──▶ RedirectPending ──completed──▶ /dashboard
//!   ▼                                                 │                     │
//! ConfigurationError                                  └──── next attempt ── Error
//! ```
//!
//! The hosted checkout script is modelled as a [`ScopedWidget`]: it is set up
//! once, only reachable after its ready signal, and torn down with the view.
//!
//! The subscribe page's inline script is the browser rendition of
//! [`SubscribeFlow`]. It takes its button labels from
//! [`SubscribeState::button_label`] and its event names from
//! [`CheckoutEvent::provider_name`], and must follow the same transitions.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::checkout::{CheckoutResponse, ErrorResponse};
use crate::models::Profile;

/// Shown when a checkout link could not be obtained or opened.
pub const SUBSCRIBE_FAILED: &str = "We couldn't start checkout. Please try again.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("billing client token is not configured")]
    MissingClientToken,
    #[error("billing provider failed to initialise")]
    ProviderUnavailable,
}

/// The billing provider's client-side checkout overlay.
#[async_trait]
pub trait CheckoutWidget: Send {
    /// Loads the provider script and initialises it with `client_token`.
    async fn setup(&mut self, client_token: &str) -> Result<()>;
    /// Opens the hosted overlay on `checkout_url`.
    fn open(&self, checkout_url: &str) -> Result<()>;
    /// Detaches the script and any listeners.
    fn teardown(&mut self);
}

/// Owns a [`CheckoutWidget`] and hands it out only after setup succeeded.
pub struct ScopedWidget<W: CheckoutWidget> {
    widget: W,
    ready: bool,
}

impl<W: CheckoutWidget> ScopedWidget<W> {
    pub fn new(widget: W) -> Self {
        Self {
            widget,
            ready: false,
        }
    }

    pub async fn acquire(&mut self, client_token: &str) -> Result<()> {
        if self.ready {
            return Ok(());
        }
        self.widget.setup(client_token).await?;
        self.ready = true;
        Ok(())
    }

    pub fn ready(&self) -> Option<&W> {
        self.ready.then_some(&self.widget)
    }

    pub fn release(&mut self) {
        if self.ready {
            self.widget.teardown();
            self.ready = false;
        }
    }
}

impl<W: CheckoutWidget> Drop for ScopedWidget<W> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Browser navigation.
pub trait Navigator: Send {
    fn navigate(&mut self, path: &str);
}

/// Events reported by the checkout overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutEvent {
    Completed,
    Closed,
}

impl CheckoutEvent {
    /// Event name as delivered by the provider's event callback.
    pub fn provider_name(&self) -> &'static str {
        match self {
            CheckoutEvent::Completed => "checkout.completed",
            CheckoutEvent::Closed => "checkout.closed",
        }
    }

    /// Maps a provider event name; events the flow ignores yield `None`.
    pub fn from_provider_name(name: &str) -> Option<Self> {
        [CheckoutEvent::Completed, CheckoutEvent::Closed]
            .into_iter()
            .find(|e| e.provider_name() == name)
    }
}

/// Requests a personalised checkout URL from the application server.
#[async_trait]
pub trait PaymentLinkClient: Send + Sync {
    async fn create_payment_link(&self, user_email: &str, user_id: &str) -> Result<String>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentLinkBody<'a> {
    user_email: &'a str,
    user_id: &'a str,
}

/// Calls `POST /api/create-payment-link` on the application server.
pub struct HttpPaymentLinkClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPaymentLinkClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/create-payment-link", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl PaymentLinkClient for HttpPaymentLinkClient {
    async fn create_payment_link(&self, user_email: &str, user_id: &str) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&PaymentLinkBody {
                user_email,
                user_id,
            })
            .send()
            .await
            .with_context(|| format!("POST {} failed", self.endpoint))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<ErrorResponse>()
                .await
                .map(|e| e.error)
                .unwrap_or_default();
            bail!("POST {} returned {}: {}", self.endpoint, status, detail);
        }

        let body: CheckoutResponse = resp
            .json()
            .await
            .with_context(|| format!("POST {} returned no checkout URL", self.endpoint))?;
        if body.checkout_url.is_empty() {
            bail!("POST {} returned an empty checkout URL", self.endpoint);
        }
        Ok(body.checkout_url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeState {
    Idle,
    InitializingProvider,
    Ready,
    Submitting,
    RedirectPending,
    /// Recoverable; the next `subscribe` retries.
    Error(String),
    /// The widget could not be set up; the subscribe action stays disabled.
    ProviderUnavailable,
    /// Fatal for this view.
    ConfigurationError(String),
}

impl SubscribeState {
    pub fn button_label(&self) -> &'static str {
        match self {
            SubscribeState::Idle | SubscribeState::InitializingProvider => {
                "Loading payment system..."
            }
            SubscribeState::Submitting | SubscribeState::RedirectPending => "Opening checkout...",
            SubscribeState::Ready
            | SubscribeState::Error(_)
            | SubscribeState::ProviderUnavailable
            | SubscribeState::ConfigurationError(_) => "Subscribe Now",
        }
    }
}

pub struct SubscribeFlow<W: CheckoutWidget, N: Navigator> {
    state: SubscribeState,
    widget: ScopedWidget<W>,
    navigator: N,
    dashboard_path: String,
    redirected: bool,
}

impl<W: CheckoutWidget, N: Navigator> SubscribeFlow<W, N> {
    pub fn new(widget: W, navigator: N) -> Self {
        Self {
            state: SubscribeState::Idle,
            widget: ScopedWidget::new(widget),
            navigator,
            dashboard_path: "/dashboard".to_string(),
            redirected: false,
        }
    }

    pub fn with_dashboard_path(mut self, path: &str) -> Self {
        self.dashboard_path = path.to_string();
        self
    }

    pub fn state(&self) -> &SubscribeState {
        &self.state
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }

    /// Whether the subscribe button is enabled.
    pub fn can_subscribe(&self) -> bool {
        matches!(self.state, SubscribeState::Ready | SubscribeState::Error(_))
    }

    pub async fn initialize(&mut self, client_token: Option<&str>) -> Result<(), SubscribeError> {
        let Some(token) = client_token.map(str::trim).filter(|t| !t.is_empty()) else {
            let err = SubscribeError::MissingClientToken;
            tracing::error!("{}", err);
            self.state = SubscribeState::ConfigurationError(err.to_string());
            return Err(err);
        };

        self.state = SubscribeState::InitializingProvider;
        match self.widget.acquire(token).await {
            Ok(()) => {
                self.state = SubscribeState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "checkout widget setup failed");
                self.state = SubscribeState::ProviderUnavailable;
                Err(SubscribeError::ProviderUnavailable)
            }
        }
    }

    /// Starts a checkout for `profile`. Returns `false` without doing anything
    /// when the action is disabled.
    pub async fn subscribe(&mut self, client: &dyn PaymentLinkClient, profile: &Profile) -> bool {
        if !self.can_subscribe() {
            return false;
        }
        let Some(widget) = self.widget.ready() else {
            return false;
        };
        self.state = SubscribeState::Submitting;

        let result = match profile.email.as_deref().filter(|e| !e.is_empty()) {
            Some(email) => client.create_payment_link(email, &profile.id).await,
            None => Err(anyhow::anyhow!("profile {} has no email address", profile.id)),
        };
        let opened = result.and_then(|url| widget.open(&url));

        match opened {
            Ok(()) => {
                self.state = SubscribeState::RedirectPending;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "could not start checkout");
                self.state = SubscribeState::Error(SUBSCRIBE_FAILED.to_string());
                false
            }
        }
    }

    /// Handles an overlay event. Navigates to the dashboard on the first
    /// completion only.
    pub fn on_checkout_event(&mut self, event: CheckoutEvent) {
        match event {
            CheckoutEvent::Completed => {
                if self.state == SubscribeState::RedirectPending && !self.redirected {
                    self.redirected = true;
                    self.navigator.navigate(&self.dashboard_path);
                }
            }
            CheckoutEvent::Closed => {
                if self.state == SubscribeState::RedirectPending && !self.redirected {
                    tracing::info!("checkout closed without payment");
                    self.state = SubscribeState::Ready;
                }
            }
        }
    }

    pub fn teardown(&mut self) {
        self.widget.release();
        self.state = SubscribeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct WidgetLog {
        setups: AtomicUsize,
        teardowns: AtomicUsize,
        opened: Mutex<Vec<String>>,
    }

    struct FakeWidget {
        log: Arc<WidgetLog>,
        fail_setup: bool,
    }

    #[async_trait]
    impl CheckoutWidget for FakeWidget {
        async fn setup(&mut self, _client_token: &str) -> Result<()> {
            self.log.setups.fetch_add(1, Ordering::SeqCst);
            if self.fail_setup {
                bail!("script blocked");
            }
            Ok(())
        }

        fn open(&self, checkout_url: &str) -> Result<()> {
            self.log.opened.lock().unwrap().push(checkout_url.to_string());
            Ok(())
        }

        fn teardown(&mut self) {
            self.log.teardowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        visits: Vec<String>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&mut self, path: &str) {
            self.visits.push(path.to_string());
        }
    }

    struct StubLinks {
        calls: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl PaymentLinkClient for StubLinks {
        async fn create_payment_link(&self, user_email: &str, user_id: &str) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                bail!("500 Failed to create checkout session.");
            }
            Ok(format!("https://pay.example/checkout?u={}&e={}", user_id, user_email))
        }
    }

    fn links(fail_first: usize) -> StubLinks {
        StubLinks {
            calls: AtomicUsize::new(0),
            fail_first,
        }
    }

    fn flow(fail_setup: bool) -> (SubscribeFlow<FakeWidget, RecordingNavigator>, Arc<WidgetLog>) {
        let log = Arc::new(WidgetLog::default());
        let widget = FakeWidget {
            log: log.clone(),
            fail_setup,
        };
        (SubscribeFlow::new(widget, RecordingNavigator::default()), log)
    }

    fn profile() -> Profile {
        Profile {
            id: "user_1".into(),
            email: Some("ada@example.com".into()),
            first_name: Some("Ada".into()),
        }
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let (mut f, log) = flow(false);
        assert_eq!(
            f.initialize(Some("  ")).await,
            Err(SubscribeError::MissingClientToken)
        );
        assert!(matches!(f.state(), SubscribeState::ConfigurationError(_)));
        assert!(!f.can_subscribe());
        assert_eq!(log.setups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_setup_disables_subscribe() {
        let (mut f, log) = flow(true);
        assert!(f.initialize(Some("test_tok")).await.is_err());
        assert_eq!(f.state(), &SubscribeState::ProviderUnavailable);

        let client = links(0);
        assert!(!f.subscribe(&client, &profile()).await);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(log.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_recoverable() {
        let (mut f, log) = flow(false);
        f.initialize(Some("test_tok")).await.unwrap();

        let client = links(1);
        assert!(!f.subscribe(&client, &profile()).await);
        assert_eq!(
            f.state(),
            &SubscribeState::Error(SUBSCRIBE_FAILED.to_string())
        );
        assert!(f.can_subscribe());
        assert!(f.navigator().visits.is_empty());

        assert!(f.subscribe(&client, &profile()).await);
        assert_eq!(f.state(), &SubscribeState::RedirectPending);
        assert_eq!(
            log.opened.lock().unwrap().as_slice(),
            ["https://pay.example/checkout?u=user_1&e=ada@example.com"]
        );
    }

    #[tokio::test]
    async fn completion_navigates_exactly_once() {
        let (mut f, _log) = flow(false);
        f.initialize(Some("test_tok")).await.unwrap();
        assert!(f.subscribe(&links(0), &profile()).await);

        f.on_checkout_event(CheckoutEvent::Completed);
        f.on_checkout_event(CheckoutEvent::Completed);
        assert_eq!(f.navigator().visits, vec!["/dashboard"]);
    }

    #[tokio::test]
    async fn completion_without_checkout_is_ignored() {
        let (mut f, _log) = flow(false);
        f.initialize(Some("test_tok")).await.unwrap();
        f.on_checkout_event(CheckoutEvent::Completed);
        assert!(f.navigator().visits.is_empty());
    }

    #[tokio::test]
    async fn closing_overlay_returns_to_ready() {
        let (mut f, _log) = flow(false);
        f.initialize(Some("test_tok")).await.unwrap();
        assert!(f.subscribe(&links(0), &profile()).await);
        f.on_checkout_event(CheckoutEvent::Closed);
        assert_eq!(f.state(), &SubscribeState::Ready);
    }

    #[tokio::test]
    async fn profile_without_email_fails_without_calling_server() {
        let (mut f, _log) = flow(false);
        f.initialize(Some("test_tok")).await.unwrap();
        let client = links(0);
        let anonymous = Profile {
            email: None,
            ..profile()
        };
        assert!(!f.subscribe(&client, &anonymous).await);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn widget_is_released_on_teardown_and_drop() {
        let (mut f, log) = flow(false);
        f.initialize(Some("test_tok")).await.unwrap();
        f.teardown();
        assert_eq!(log.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(f.state(), &SubscribeState::Idle);

        f.initialize(Some("test_tok")).await.unwrap();
        drop(f);
        assert_eq!(log.teardowns.load(Ordering::SeqCst), 2);
        assert_eq!(log.setups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn provider_event_names_round_trip() {
        assert_eq!(
            CheckoutEvent::from_provider_name("checkout.completed"),
            Some(CheckoutEvent::Completed)
        );
        assert_eq!(
            CheckoutEvent::from_provider_name("checkout.closed"),
            Some(CheckoutEvent::Closed)
        );
        assert_eq!(CheckoutEvent::from_provider_name("checkout.loaded"), None);
    }

    #[tokio::test]
    async fn button_label_tracks_state() {
        let (mut f, _log) = flow(false);
        assert_eq!(f.state().button_label(), "Loading payment system...");
        f.initialize(Some("test_tok")).await.unwrap();
        assert_eq!(f.state().button_label(), "Subscribe Now");
        assert!(f.subscribe(&links(0), &profile()).await);
        assert_eq!(f.state().button_label(), "Opening checkout...");
    }
}
