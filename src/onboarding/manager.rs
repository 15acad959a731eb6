//! OnboardingManager: owns the live wizard session and applies the state
//! machine's effects to the profile store, the ingestion pipeline, the invite
//! resolver and the host navigator.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::invite::{InviteResolver, validate_invite_code};
use super::state::{
    OnboardingEffect, OnboardingEvent, OnboardingMode, OnboardingStep, Transition,
    confirmation_message, transition,
};
use crate::config::IngestionConfig;
use crate::error::OnboardingError;
use crate::ingestion::{
    ArchiveInput, IngestionPipeline, IngestionReport, IngestionSnapshot, SnapshotSource,
};
use crate::navigation::Navigator;
use crate::profile::{Profile, ProfileStore, ProfileUpdate, RELATIONSHIP_OPTIONS};

/// Origin label on snapshots produced by the wizard's upload step.
pub const INGESTION_ORIGIN: &str = "onboarding";

/// Transient wizard state. Lives as long as the manager.
struct OnboardingSession {
    step: OnboardingStep,
    invite_code: Option<String>,
    pipeline: IngestionPipeline,
    last_report: Option<IngestionReport>,
}

/// Coordinates the guided setup.
pub struct OnboardingManager {
    profile: Arc<ProfileStore>,
    invites: Arc<dyn InviteResolver>,
    navigator: Arc<dyn Navigator>,
    session: Arc<Mutex<OnboardingSession>>,
}

impl OnboardingManager {
    pub fn new(
        profile: Arc<ProfileStore>,
        invites: Arc<dyn InviteResolver>,
        navigator: Arc<dyn Navigator>,
        ingestion: IngestionConfig,
    ) -> Self {
        Self::with_pipeline(
            profile,
            invites,
            navigator,
            IngestionPipeline::new(INGESTION_ORIGIN, ingestion),
        )
    }

    /// Build with a caller-supplied pipeline (e.g. one sharing a broadcast
    /// channel with other screens).
    pub fn with_pipeline(
        profile: Arc<ProfileStore>,
        invites: Arc<dyn InviteResolver>,
        navigator: Arc<dyn Navigator>,
        pipeline: IngestionPipeline,
    ) -> Self {
        Self {
            profile,
            invites,
            navigator,
            session: Arc::new(Mutex::new(OnboardingSession {
                step: OnboardingStep::default(),
                invite_code: None,
                pipeline,
                last_report: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, OnboardingSession> {
        lock_session(&self.session)
    }

    /// Current step.
    pub fn step(&self) -> OnboardingStep {
        self.lock().step
    }

    // ── Transitions ─────────────────────────────────────────────────

    pub async fn next(&self) -> Result<OnboardingStep, OnboardingError> {
        self.dispatch(OnboardingEvent::Next).await
    }

    pub async fn back(&self) -> Result<OnboardingStep, OnboardingError> {
        self.dispatch(OnboardingEvent::Back).await
    }

    pub async fn choose_mode(&self, mode: OnboardingMode) -> Result<OnboardingStep, OnboardingError> {
        self.dispatch(OnboardingEvent::ChooseMode(mode)).await
    }

    pub async fn skip_ingestion(&self) -> Result<OnboardingStep, OnboardingError> {
        self.dispatch(OnboardingEvent::Skip).await
    }

    /// "Go to dashboard": persist the onboarded flag, then hand control back
    /// to the host.
    pub async fn finish(&self) -> Result<OnboardingStep, OnboardingError> {
        self.dispatch(OnboardingEvent::Finish).await
    }

    /// Submit an invite code on the join branch.
    ///
    /// Codes shorter than the minimum never reach the resolver. A resolution
    /// failure leaves the wizard on the invite step.
    pub async fn submit_invite(&self, code: &str) -> Result<OnboardingStep, OnboardingError> {
        {
            let mut session = self.lock();
            if session.step != OnboardingStep::InviteEntry {
                return Err(OnboardingError::InvalidTransition {
                    from: session.step.to_string(),
                    event: "submit_invite".to_string(),
                });
            }
            session.invite_code = Some(code.to_string());
        }
        validate_invite_code(code)?;

        let record = match self.invites.resolve(code).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Invite resolution failed");
                return Err(e);
            }
        };
        info!(subject = %record.subject_name, "Invite code resolved");
        self.dispatch(OnboardingEvent::InviteResolved(record)).await
    }

    /// Apply `event` and its effects.
    ///
    /// Profile writes run before the step is committed; if one fails the
    /// session stays on `from` and the same event can be retried. Redirects
    /// run last, only after the commit.
    async fn dispatch(&self, event: OnboardingEvent) -> Result<OnboardingStep, OnboardingError> {
        let event_name = event.name();
        let (from, t, writes) = {
            let mut session = self.lock();
            let from = session.step;
            let t = transition(&from, event)?;
            let writes = t.effects.iter().any(OnboardingEffect::writes_profile);
            if !writes {
                commit(&mut session, &t);
            }
            (from, t, writes)
        };

        for effect in &t.effects {
            match effect {
                OnboardingEffect::ApplySubject(record) => {
                    self.profile.update(record.clone().into()).await?;
                }
                OnboardingEffect::MarkOnboarded => {
                    self.profile.mark_onboarded().await?;
                }
                OnboardingEffect::CancelIngestion | OnboardingEffect::Redirect(_) => {}
            }
        }

        if writes {
            let mut session = self.lock();
            if session.step != from {
                warn!(from = %from, now = %session.step, event = event_name, "Step changed during transition");
                return Err(OnboardingError::InvalidTransition {
                    from: session.step.to_string(),
                    event: event_name.to_string(),
                });
            }
            commit(&mut session, &t);
        }
        info!(from = %from, to = %t.step, event = event_name, "Onboarding transition");

        for effect in &t.effects {
            if let OnboardingEffect::Redirect(path) = effect {
                self.navigator.redirect(path);
            }
        }
        Ok(t.step)
    }

    // ── Field edits ─────────────────────────────────────────────────

    /// Edit the holder's name/relationship. Only allowed on the identity step;
    /// values are not validated.
    pub async fn update_identity(&self, update: ProfileUpdate) -> Result<Profile, OnboardingError> {
        self.ensure_step(OnboardingStep::Identity)?;
        let update = ProfileUpdate {
            holder_name: update.holder_name,
            relationship_role: update.relationship_role,
            ..Default::default()
        };
        Ok(self.profile.update(update).await?)
    }

    /// Edit the subject's name/id/facility. Only allowed on the create
    /// branch's details step; values are not validated.
    pub async fn update_subject(&self, update: ProfileUpdate) -> Result<Profile, OnboardingError> {
        self.ensure_step(OnboardingStep::SubjectDetails)?;
        let update = ProfileUpdate {
            subject_name: update.subject_name,
            subject_id: update.subject_id,
            subject_facility: update.subject_facility,
            ..Default::default()
        };
        Ok(self.profile.update(update).await?)
    }

    fn ensure_step(&self, expected: OnboardingStep) -> Result<(), OnboardingError> {
        let step = self.step();
        if step != expected {
            return Err(OnboardingError::FieldsNotEditable {
                step: step.to_string(),
            });
        }
        Ok(())
    }

    // ── Ingestion ───────────────────────────────────────────────────

    /// Start the case-archive import on the ingestion step. Completion moves
    /// the wizard to success on its own.
    pub fn upload_archive(
        &self,
        input: ArchiveInput,
    ) -> Result<watch::Receiver<IngestionSnapshot>, OnboardingError> {
        let mut session = self.lock();
        if session.step != OnboardingStep::Ingestion {
            return Err(OnboardingError::InvalidTransition {
                from: session.step.to_string(),
                event: "upload_archive".to_string(),
            });
        }
        let weak = Arc::downgrade(&self.session);
        let rx = session
            .pipeline
            .start(input, move |report| on_ingestion_complete(&weak, report))?;
        Ok(rx)
    }

    pub fn ingestion_snapshot(&self) -> Option<IngestionSnapshot> {
        self.lock().pipeline.snapshot()
    }

    /// Tear down the session and start over from the identity step.
    pub fn restart(&self) {
        let mut session = self.lock();
        session.pipeline.cancel();
        session.step = OnboardingStep::default();
        session.invite_code = None;
        session.last_report = None;
        info!("Onboarding session restarted");
    }

    // ── Status ──────────────────────────────────────────────────────

    pub async fn status(&self) -> OnboardingStatus {
        let (step, invite_code, ingestion, ingestion_report) = {
            let session = self.lock();
            (
                session.step,
                session.invite_code.clone(),
                session.pipeline.snapshot(),
                session.last_report.clone(),
            )
        };
        let profile = self.profile.read().await;
        let confirmation = match step {
            OnboardingStep::Success { mode } => {
                Some(confirmation_message(mode, &profile.subject_name))
            }
            _ => None,
        };
        OnboardingStatus {
            onboarding_completed: profile.is_onboarded,
            step,
            mode: step.mode(),
            progress: step.progress_index(),
            relationship_options: RELATIONSHIP_OPTIONS,
            invite_code,
            confirmation,
            ingestion,
            ingestion_report,
            profile,
        }
    }
}

impl SnapshotSource for OnboardingManager {
    fn current_snapshot(&self) -> Option<IngestionSnapshot> {
        self.ingestion_snapshot()
    }
}

impl Drop for OnboardingManager {
    fn drop(&mut self) {
        lock_session(&self.session).pipeline.cancel();
    }
}

/// Move the session to `t.step`, applying the effects that act on the
/// session itself.
fn commit(session: &mut OnboardingSession, t: &Transition) {
    if t.effects.contains(&OnboardingEffect::CancelIngestion) {
        session.pipeline.cancel();
    }
    session.step = t.step;
}

fn lock_session(session: &Mutex<OnboardingSession>) -> MutexGuard<'_, OnboardingSession> {
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Completion callback for the wizard's upload. A session that is gone or has
/// already left the ingestion step ignores it.
fn on_ingestion_complete(session: &Weak<Mutex<OnboardingSession>>, report: IngestionReport) {
    let Some(session) = session.upgrade() else {
        return;
    };
    let mut session = lock_session(&session);
    match transition(&session.step, OnboardingEvent::IngestionCompleted) {
        Ok(t) => {
            info!(from = %session.step, to = %t.step, run_id = %report.run_id, "Ingestion finished onboarding step");
            session.step = t.step;
            session.last_report = Some(report);
        }
        Err(e) => debug!(error = %e, "Ignoring ingestion completion"),
    }
}

/// Snapshot of the wizard for the host.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub onboarding_completed: bool,
    pub step: OnboardingStep,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<OnboardingMode>,
    pub progress: u8,
    /// Suggested roles for the identity step.
    pub relationship_options: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion: Option<IngestionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_report: Option<IngestionReport>,
    pub profile: Profile,
}
