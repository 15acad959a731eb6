//! Shared types for the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Input ───────────────────────────────────────────────────────────

/// A user-supplied archive-like file. Only its metadata is inspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
}

/// Markers in a MIME type that identify a compressed archive.
const ARCHIVE_TYPE_MARKERS: &[&str] = &["zip", "compressed"];

impl ArchiveInput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }

    /// Acceptance predicate: a `.zip` name, or a MIME type carrying an
    /// archive marker. Either check alone is enough.
    pub fn is_archive(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        let mime = self.mime_type.to_ascii_lowercase();
        name.ends_with(".zip") || ARCHIVE_TYPE_MARKERS.iter().any(|m| mime.contains(m))
    }
}

// ── Phase ───────────────────────────────────────────────────────────

/// Phases of one ingestion run. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionPhase {
    Idle,
    Analyzing,
    Processing,
    Complete,
}

impl IngestionPhase {
    /// Human-readable status line for the upload card.
    pub fn status_text(&self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Analyzing => Some("Analyzing file structure..."),
            Self::Processing => Some("Categorizing documents..."),
            Self::Complete => Some("All files have been organized."),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for IngestionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Processing => "processing",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

// ── Script ──────────────────────────────────────────────────────────

/// Document categories reported by the categorization stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentTag {
    Legal,
    Medical,
    Grievance,
}

/// One timed step of the ingestion script.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub percent: u8,
    /// Phase after this stage has run.
    pub phase: IngestionPhase,
    pub log: &'static str,
    /// File categorized by this stage, if any.
    pub hit: Option<(&'static str, DocumentTag)>,
}

/// Documents reported in the final summary line.
pub const DOCUMENTS_PROCESSED: u32 = 14;

/// The fixed narrative every accepted archive walks through.
pub const STAGE_SCRIPT: [Stage; 6] = [
    Stage {
        percent: 10,
        phase: IngestionPhase::Analyzing,
        log: "📂 Opening archive...",
        hit: None,
    },
    Stage {
        percent: 30,
        phase: IngestionPhase::Analyzing,
        log: "🔍 Scanning for court documents...",
        hit: None,
    },
    Stage {
        percent: 50,
        phase: IngestionPhase::Processing,
        log: "📄 Found 'Complaint_2024.pdf' -> Tagging as LEGAL",
        hit: Some(("Complaint_2024.pdf", DocumentTag::Legal)),
    },
    Stage {
        percent: 70,
        phase: IngestionPhase::Processing,
        log: "🏥 Found 'Medical_Records_Sept.pdf' -> Tagging as MEDICAL",
        hit: Some(("Medical_Records_Sept.pdf", DocumentTag::Medical)),
    },
    Stage {
        percent: 90,
        phase: IngestionPhase::Processing,
        log: "📝 Found 'Grievance_602.jpg' -> Tagging as GRIEVANCE",
        hit: Some(("Grievance_602.jpg", DocumentTag::Grievance)),
    },
    Stage {
        percent: 100,
        phase: IngestionPhase::Complete,
        log: "✅ Import complete. 14 documents processed.",
        hit: None,
    },
];

// ── Observable state ────────────────────────────────────────────────

/// Point-in-time view of one run, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionSnapshot {
    pub run_id: Uuid,
    /// Which screen started the run ("onboarding", "documents").
    pub origin: String,
    pub file_name: String,
    pub phase: IngestionPhase,
    pub percent: u8,
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl IngestionSnapshot {
    pub(crate) fn new(run_id: Uuid, origin: &str, input: &ArchiveInput) -> Self {
        Self {
            run_id,
            origin: origin.to_string(),
            file_name: input.name.clone(),
            phase: IngestionPhase::Idle,
            percent: 0,
            log: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Apply one script stage. Phase and percent never move backward.
    pub(crate) fn advance(&mut self, stage: &Stage) {
        self.phase = self.phase.max(stage.phase);
        self.percent = self.percent.max(stage.percent);
        self.log.push(stage.log.to_string());
    }
}

/// A categorized document from the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedDocument {
    pub file_name: String,
    pub tag: DocumentTag,
}

/// Handed to the completion callback when a run reaches `Complete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub file_name: String,
    pub documents_processed: u32,
    pub tagged: Vec<TaggedDocument>,
}

impl IngestionReport {
    pub(crate) fn from_script(run_id: Uuid, file_name: &str) -> Self {
        let tagged = STAGE_SCRIPT
            .iter()
            .filter_map(|s| s.hit)
            .map(|(file, tag)| TaggedDocument {
                file_name: file.to_string(),
                tag,
            })
            .collect();
        Self {
            run_id,
            file_name: file_name.to_string(),
            documents_processed: DOCUMENTS_PROCESSED,
            tagged,
        }
    }
}
