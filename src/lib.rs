//! Case Companion: first-run onboarding host and case document import.

pub mod app;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod navigation;
pub mod onboarding;
pub mod profile;
pub mod store;
