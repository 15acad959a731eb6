//! Onboarding state machine: a pure transition function over named steps.
//!
//! The chosen mode is carried by the step itself (`InviteEntry` is always the
//! join branch, `SubjectDetails` and `Ingestion` always the create branch), so
//! there is no separate counter to reinterpret.

use serde::{Deserialize, Serialize};

use super::invite::SubjectRecord;
use crate::error::OnboardingError;

/// Which branch of the setup the user picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingMode {
    /// Start a new case.
    Create,
    /// Join an existing case with an invite code.
    Join,
}

impl std::fmt::Display for OnboardingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Join => write!(f, "join"),
        }
    }
}

/// Wizard steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum OnboardingStep {
    /// Holder name and relationship.
    #[default]
    Identity,
    /// Create vs. join.
    ModeSelect,
    /// Join branch: invite code entry.
    InviteEntry,
    /// Create branch: subject name, id and facility.
    SubjectDetails,
    /// Create branch: optional archive upload.
    Ingestion,
    /// Terminal confirmation.
    Success { mode: OnboardingMode },
}

impl OnboardingStep {
    /// The branch this step belongs to, if one has been chosen.
    pub fn mode(&self) -> Option<OnboardingMode> {
        match self {
            Self::Identity | Self::ModeSelect => None,
            Self::InviteEntry => Some(OnboardingMode::Join),
            Self::SubjectDetails | Self::Ingestion => Some(OnboardingMode::Create),
            Self::Success { mode } => Some(*mode),
        }
    }

    /// 1-based position for a step indicator.
    pub fn progress_index(&self) -> u8 {
        match self {
            Self::Identity => 1,
            Self::ModeSelect => 2,
            Self::InviteEntry | Self::SubjectDetails => 3,
            Self::Ingestion => 4,
            Self::Success { .. } => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::ModeSelect => "mode_select",
            Self::InviteEntry => "invite_entry",
            Self::SubjectDetails => "subject_details",
            Self::Ingestion => "ingestion",
            Self::Success { .. } => "success",
        };
        write!(f, "{s}")
    }
}

/// Inputs that drive the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEvent {
    Next,
    Back,
    ChooseMode(OnboardingMode),
    /// An invite code resolved to an existing case record.
    InviteResolved(SubjectRecord),
    /// The ingestion run attached to the create branch finished.
    IngestionCompleted,
    /// The user skipped the archive upload.
    Skip,
    /// "Go to dashboard".
    Finish,
}

impl OnboardingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Next => "next",
            Self::Back => "back",
            Self::ChooseMode(OnboardingMode::Create) => "choose_create",
            Self::ChooseMode(OnboardingMode::Join) => "choose_join",
            Self::InviteResolved(_) => "invite_resolved",
            Self::IngestionCompleted => "ingestion_completed",
            Self::Skip => "skip",
            Self::Finish => "finish",
        }
    }
}

/// Side-effects requested by a transition. The manager applies them in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEffect {
    /// Copy the resolved case record into the profile.
    ApplySubject(SubjectRecord),
    /// Stop the ingestion run in progress, if any.
    CancelIngestion,
    /// Set the persisted onboarded flag.
    MarkOnboarded,
    /// Hand control back to the host.
    Redirect(String),
}

impl OnboardingEffect {
    /// Whether applying this effect writes the persisted profile.
    pub fn writes_profile(&self) -> bool {
        matches!(self, Self::ApplySubject(_) | Self::MarkOnboarded)
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub step: OnboardingStep,
    pub effects: Vec<OnboardingEffect>,
}

impl Transition {
    fn to(step: OnboardingStep) -> Self {
        Self {
            step,
            effects: Vec::new(),
        }
    }

    fn with(step: OnboardingStep, effects: Vec<OnboardingEffect>) -> Self {
        Self { step, effects }
    }
}

/// Route the host navigates to when the wizard exits.
pub const DASHBOARD_ROUTE: &str = "/";

/// Compute the next step for `event`. Invalid pairs leave the caller's step
/// untouched and return `InvalidTransition`.
pub fn transition(
    step: &OnboardingStep,
    event: OnboardingEvent,
) -> Result<Transition, OnboardingError> {
    use OnboardingStep::*;

    let next = match (step, &event) {
        (Identity, OnboardingEvent::Next) => Transition::to(ModeSelect),

        (ModeSelect, OnboardingEvent::ChooseMode(OnboardingMode::Create)) => {
            Transition::to(SubjectDetails)
        }
        (ModeSelect, OnboardingEvent::ChooseMode(OnboardingMode::Join)) => {
            Transition::to(InviteEntry)
        }
        (ModeSelect, OnboardingEvent::Back) => Transition::to(Identity),

        (InviteEntry, OnboardingEvent::InviteResolved(record)) => Transition::with(
            Success {
                mode: OnboardingMode::Join,
            },
            vec![OnboardingEffect::ApplySubject(record.clone())],
        ),
        (InviteEntry, OnboardingEvent::Back) => Transition::to(ModeSelect),

        (SubjectDetails, OnboardingEvent::Next) => Transition::to(Ingestion),
        (SubjectDetails, OnboardingEvent::Back) => Transition::to(ModeSelect),

        (Ingestion, OnboardingEvent::IngestionCompleted) => Transition::to(Success {
            mode: OnboardingMode::Create,
        }),
        (Ingestion, OnboardingEvent::Skip) => Transition::with(
            Success {
                mode: OnboardingMode::Create,
            },
            vec![OnboardingEffect::CancelIngestion],
        ),

        (Success { mode }, OnboardingEvent::Finish) => Transition::with(
            Success { mode: *mode },
            vec![
                OnboardingEffect::MarkOnboarded,
                OnboardingEffect::Redirect(DASHBOARD_ROUTE.to_string()),
            ],
        ),

        _ => {
            return Err(OnboardingError::InvalidTransition {
                from: step.to_string(),
                event: event.name().to_string(),
            });
        }
    };
    Ok(next)
}

/// Branch-specific confirmation copy for the success screen.
pub fn confirmation_message(mode: OnboardingMode, subject_name: &str) -> String {
    match mode {
        OnboardingMode::Create => format!(
            "We've set up your dashboard. You can now track timelines, log incidents, and organize documents for {subject_name}."
        ),
        OnboardingMode::Join => format!(
            "You've joined the existing case for {subject_name}. Their timeline and documents are now on your dashboard."
        ),
    }
}
