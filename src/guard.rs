//! Request-time access control.
//!
//! Every request path is classified against an ordered [`RouteTable`]; the
//! first matching rule wins. Rules are built excluded → public → protected so
//! static assets are never intercepted and public pages never consult the
//! identity provider.
//!
//! | Class | Behaviour |
//! |-------|-----------|
//! | excluded | forwarded untouched, no session lookup |
//! | public | forwarded, no session lookup |
//! | protected | forwarded with the session in request extensions, or redirected to sign-in |
//! | (no match) | governed by [`UnclassifiedPolicy`] |
//!
//! Patterns are globs where `*` also matches `/`, so `/dashboard*` covers
//! `/dashboard`, `/dashboard/` and `/dashboard/anything/below`.

use anyhow::{bail, Context, Result};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use globset::{Glob, GlobMatcher};
use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::config::RoutesConfig;
use crate::models::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Excluded,
    Public,
    Protected,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Excluded => "excluded",
            RouteClass::Public => "public",
            RouteClass::Protected => "protected",
        }
    }
}

/// Treatment of paths that match no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnclassifiedPolicy {
    #[default]
    Allow,
    Protect,
}

impl std::str::FromStr for UnclassifiedPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "allow" => Ok(UnclassifiedPolicy::Allow),
            "protect" => Ok(UnclassifiedPolicy::Protect),
            other => bail!("unknown unclassified policy '{}'", other),
        }
    }
}

pub struct RouteRule {
    pub pattern: String,
    pub class: RouteClass,
    matcher: GlobMatcher,
}

impl RouteRule {
    pub fn new(pattern: &str, class: RouteClass) -> Result<Self> {
        let matcher = Glob::new(pattern)
            .with_context(|| format!("invalid route pattern '{}'", pattern))?
            .compile_matcher();
        Ok(Self {
            pattern: pattern.to_string(),
            class,
            matcher,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }
}

/// Ordered pattern → class table.
pub struct RouteTable {
    rules: Vec<RouteRule>,
    unclassified: UnclassifiedPolicy,
}

impl RouteTable {
    pub fn new(unclassified: UnclassifiedPolicy) -> Self {
        Self {
            rules: Vec::new(),
            unclassified,
        }
    }

    pub fn push(&mut self, pattern: &str, class: RouteClass) -> Result<()> {
        self.rules.push(RouteRule::new(pattern, class)?);
        Ok(())
    }

    pub fn from_config(config: &RoutesConfig) -> Result<Self> {
        let mut table = Self::new(config.unclassified.parse()?);
        for p in &config.excluded {
            table.push(p, RouteClass::Excluded)?;
        }
        for p in &config.public {
            table.push(p, RouteClass::Public)?;
        }
        for p in &config.protected {
            table.push(p, RouteClass::Protected)?;
        }
        Ok(table)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn unclassified(&self) -> UnclassifiedPolicy {
        self.unclassified
    }

    /// First matching rule's class, top to bottom.
    pub fn classify(&self, path: &str) -> Option<RouteClass> {
        self.rules
            .iter()
            .find(|r| r.matches(path))
            .map(|r| r.class)
    }

    /// Whether a request for `path` must carry a session.
    pub fn requires_session(&self, path: &str) -> bool {
        match self.classify(path) {
            Some(RouteClass::Protected) => true,
            Some(_) => false,
            None => self.unclassified == UnclassifiedPolicy::Protect,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    /// Excluded from interception entirely.
    Pass,
    /// Forward the request; protected paths carry the resolved session.
    Allow(Option<Session>),
    /// Send the client to this location.
    Redirect(String),
}

pub struct Guard {
    table: RouteTable,
    identity: Arc<dyn IdentityProvider>,
    sign_in_path: String,
}

impl Guard {
    pub fn new(table: RouteTable, identity: Arc<dyn IdentityProvider>, sign_in_path: &str) -> Self {
        Self {
            table,
            identity,
            sign_in_path: sign_in_path.to_string(),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub async fn check(&self, path: &str, headers: &HeaderMap) -> GuardDecision {
        match self.table.classify(path) {
            Some(RouteClass::Excluded) => return GuardDecision::Pass,
            Some(RouteClass::Public) => return GuardDecision::Allow(None),
            _ => {}
        }

        if !self.table.requires_session(path) {
            return GuardDecision::Allow(None);
        }

        match self.identity.session(headers).await {
            Ok(Some(session)) => GuardDecision::Allow(Some(session)),
            Ok(None) => {
                tracing::debug!(path, "no session, redirecting to sign-in");
                GuardDecision::Redirect(self.sign_in_path.clone())
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "identity check failed, treating request as anonymous");
                GuardDecision::Redirect(self.sign_in_path.clone())
            }
        }
    }
}

/// Axum middleware applying [`Guard::check`] to every request.
pub async fn guard_layer(
    State(guard): State<Arc<Guard>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    match guard.check(&path, request.headers()).await {
        GuardDecision::Pass | GuardDecision::Allow(None) => next.run(request).await,
        GuardDecision::Allow(Some(session)) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        GuardDecision::Redirect(location) => Redirect::to(&location).into_response(),
    }
}
