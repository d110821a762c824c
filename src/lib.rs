//! # NicheFire
//!
//! A subscription-gated dashboard of viral YouTube Shorts outliers.
//!
//! The outlier list, identity and billing all live in external services.
//! This crate guards routes, renders the views, derives the filtered and
//! sorted list, and brokers checkout sessions with the billing provider.
//!
//! ## Architecture
//!
//! ```text
//!  request ──▶ ┌────────────┐  allow   ┌──────────────┐     ┌───────────────┐
//!              │   Guard    │────────▶│   Handlers   │────▶│ OutlierSource │ (HTTP)
//!              │ RouteTable │         │ pages/checkout│     └───────────────┘
//!              └─────┬──────┘         └──────┬───────┘     ┌───────────────┐
//!                    │ redirect              └────────────▶│BillingProvider│ (Paddle)
//!                    ▼                                      └───────────────┘
//!               /sign-in  ◀── IdentityProvider (signed session cookie)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overlay |
//! | [`models`] | Core data types |
//! | [`catalog`] | Filter/sort derivation and card presentation |
//! | [`outliers`] | Outlier data sources |
//! | [`auth`] | Identity provider and signed session cookies |
//! | [`guard`] | Route classification and access control middleware |
//! | [`billing`] | Billing provider and Paddle client |
//! | [`checkout`] | Checkout session endpoints |
//! | [`dashboard`] | Dashboard view model and debouncer |
//! | [`subscribe`] | Subscribe view model and checkout widget lifecycle |
//! | [`pages`] | HTML rendering |
//! | [`server`] | Router assembly and HTTP server |

pub mod auth;
pub mod billing;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod dashboard;
pub mod guard;
pub mod models;
pub mod outliers;
pub mod pages;
pub mod server;
pub mod subscribe;
