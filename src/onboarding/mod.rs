//! Onboarding: the first-run guided setup that gates the rest of the app.
//!
//! The user states who they are, then either creates a new case (subject
//! details, optional archive import) or joins an existing one with an invite
//! code. Leaving the success step persists the onboarded flag and hands
//! control back to the host.

pub mod invite;
pub mod manager;
pub mod routes;
pub mod state;

pub use invite::{InviteResolver, LocalInviteResolver, MIN_INVITE_CODE_LEN, SubjectRecord};
pub use manager::{OnboardingManager, OnboardingStatus};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{OnboardingEffect, OnboardingEvent, OnboardingMode, OnboardingStep, transition};
