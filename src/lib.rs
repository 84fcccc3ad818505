//! SalesPulse - sales performance dashboard backend
//!
//! Ingests monthly performance spreadsheets (CSV or Excel) per branch, keeps
//! the records and the user directory in a document store, and serves
//! role-filtered records and aggregations over a JSON API.
//!
//! # Overview
//!
//! - [`ingest`]: header validation, row transformation and the keyed upsert
//! - [`analytics`]: KPI cards, team and BDE summaries, charts and rankings
//! - [`access`]: which records and views each role may see
//! - [`auth`]: password hashing, sessions and one-time password tokens
//! - [`dashboard`]: one method per operation, shared by the API and the CLI
//! - [`api`]: the warp routes
//!
//! # Quick Start
//!
//! ```rust
//! use salespulse::analytics::RecordScope;
//! use salespulse::dashboard::Dashboard;
//! use salespulse::store::MemoryStore;
//! use salespulse::DashboardConfig;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let dashboard = Dashboard::new(Arc::new(MemoryStore::new()), DashboardConfig::default());
//! let cards = dashboard.kpis(None, &RecordScope::default()).await.unwrap();
//! assert_eq!(cards.len(), 6);
//! # });
//! ```

pub mod access;
pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ingest;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod testing;

pub use config::{ConfigError, DashboardConfig};
pub use dashboard::Dashboard;
pub use error::{DashboardError, DashboardResult};
pub use model::{Month, RecordView, Role, SalesRecord, User};
