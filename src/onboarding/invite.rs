//! Invite codes for the join branch.
//!
//! Resolution is behind the `InviteResolver` trait. The bundled
//! `LocalInviteResolver` answers from an in-process table and can fall back to
//! a single demo case record.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OnboardingError;
use crate::profile::ProfileUpdate;

/// Shortest code the join step will submit.
pub const MIN_INVITE_CODE_LEN: usize = 3;

/// Subject fields an invite code resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub subject_name: String,
    pub subject_id: String,
    pub subject_facility: String,
}

impl From<SubjectRecord> for ProfileUpdate {
    fn from(record: SubjectRecord) -> Self {
        ProfileUpdate::subject(
            record.subject_name,
            record.subject_id,
            record.subject_facility,
        )
    }
}

/// Length guard for the join step. Counts characters, not bytes.
pub fn validate_invite_code(code: &str) -> Result<(), OnboardingError> {
    if code.chars().count() < MIN_INVITE_CODE_LEN {
        return Err(OnboardingError::InvalidInviteCode {
            min_len: MIN_INVITE_CODE_LEN,
        });
    }
    Ok(())
}

/// Resolves an invite code to the case record it grants access to.
#[async_trait]
pub trait InviteResolver: Send + Sync {
    /// Return the record for `code`, or `InviteResolutionFailed`.
    async fn resolve(&self, code: &str) -> Result<SubjectRecord, OnboardingError>;
}

/// In-process resolver.
pub struct LocalInviteResolver {
    records: HashMap<String, SubjectRecord>,
    fallback: Option<SubjectRecord>,
}

impl LocalInviteResolver {
    /// A resolver with no records; every code fails.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            fallback: None,
        }
    }

    /// Resolve every well-formed code to the demo case record.
    pub fn demo() -> Self {
        Self::new().with_fallback(SubjectRecord {
            subject_name: "Joseph 'Joe' Rodriguez".to_string(),
            subject_id: "CDCR #T-12345".to_string(),
            subject_facility: "Corcoran State Prison".to_string(),
        })
    }

    /// Register a record for `code`. Lookup ignores case and surrounding
    /// whitespace.
    pub fn with_record(mut self, code: &str, record: SubjectRecord) -> Self {
        self.records.insert(normalize(code), record);
        self
    }

    pub fn with_fallback(mut self, record: SubjectRecord) -> Self {
        self.fallback = Some(record);
        self
    }
}

impl Default for LocalInviteResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InviteResolver for LocalInviteResolver {
    async fn resolve(&self, code: &str) -> Result<SubjectRecord, OnboardingError> {
        self.records
            .get(&normalize(code))
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| OnboardingError::InviteResolutionFailed {
                code: code.to_string(),
                reason: "no case is registered for this code".to_string(),
            })
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
