//! osr-assessment: operational standards assessment API
//!
//! Records in-store assessment responses and computes normalized scores per
//! section and per store.
//!
//! ## Components
//!
//! - **Store**: in-memory response storage keyed by store, section and question
//! - **Scoring**: section normalization, foundation question adjustments, color bands
//! - **Cache**: generation-checked cache of derived scores
//! - **Service**: validated operations tying the three together
//! - **API**: axum router exposing the service as JSON endpoints

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod scoring;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{AssessmentError, Result};
pub use service::AssessmentService;
pub use store::ResponseStore;
