//! Profile data model.

use serde::{Deserialize, Serialize};

/// Relationship labels offered by the identity step. The stored role stays
/// free text.
pub const RELATIONSHIP_OPTIONS: &[&str] = &[
    "Mother/Guardian",
    "Spouse/Partner",
    "Sibling",
    "Child",
    "Advocate/Friend",
];

/// The single persisted record describing the user and the case subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub holder_name: String,
    pub relationship_role: String,
    pub subject_name: String,
    pub subject_id: String,
    pub subject_facility: String,
    #[serde(default)]
    pub is_onboarded: bool,
}

impl Default for Profile {
    /// First-run seed.
    fn default() -> Self {
        Self {
            holder_name: "Maria Rodriguez".to_string(),
            relationship_role: "Mother/Guardian".to_string(),
            subject_name: "Joseph 'Joe' Rodriguez".to_string(),
            subject_id: "CDCR #T-12345".to_string(),
            subject_facility: "Corcoran State Prison".to_string(),
            is_onboarded: false,
        }
    }
}

impl Profile {
    /// The record produced by an explicit reset.
    pub fn empty() -> Self {
        Self {
            holder_name: String::new(),
            relationship_role: String::new(),
            subject_name: String::new(),
            subject_id: String::new(),
            subject_facility: String::new(),
            is_onboarded: false,
        }
    }

    /// Shallow-merge `update` into this profile.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(v) = update.holder_name {
            self.holder_name = v;
        }
        if let Some(v) = update.relationship_role {
            self.relationship_role = v;
        }
        if let Some(v) = update.subject_name {
            self.subject_name = v;
        }
        if let Some(v) = update.subject_id {
            self.subject_id = v;
        }
        if let Some(v) = update.subject_facility {
            self.subject_facility = v;
        }
    }
}

/// Partial profile fields. `None` leaves the stored value alone.
///
/// The onboarded flag is deliberately absent; it only moves through
/// `ProfileStore::mark_onboarded` and `ProfileStore::reset`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_facility: Option<String>,
}

impl ProfileUpdate {
    pub fn identity(holder_name: impl Into<String>, relationship_role: impl Into<String>) -> Self {
        Self {
            holder_name: Some(holder_name.into()),
            relationship_role: Some(relationship_role.into()),
            ..Default::default()
        }
    }

    pub fn subject(
        name: impl Into<String>,
        id: impl Into<String>,
        facility: impl Into<String>,
    ) -> Self {
        Self {
            subject_name: Some(name.into()),
            subject_id: Some(id.into()),
            subject_facility: Some(facility.into()),
            ..Default::default()
        }
    }
}

/// Settings keys used for profile persistence.
pub mod settings_keys {
    /// Namespaced key for the profile JSON blob.
    pub const PROFILE: &str = "bogus-user-storage";
}
