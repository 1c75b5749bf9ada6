//! Core workflow type definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::WorkflowData;
use crate::Error;

/// Default autosave period.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Identifier assigned to a workflow by the backend at creation.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub Uuid);

impl WorkflowId {
    /// Create a new unique workflow identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for WorkflowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Which step sequence a workflow follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowType {
    #[default]
    AssetCreation,
}

impl std::fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowType::AssetCreation => write!(f, "asset_creation"),
        }
    }
}

/// Names of the asset creation steps.
///
/// Declaration order matches the standard registry, but the registry is
/// what defines navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    /// Asset type, name and description
    BasicInfo,
    /// Placement under a parent asset
    Hierarchy,
    /// Schema-driven metadata
    Metadata,
    /// Classification and access control
    Security,
    /// Attached files and firmware analysis
    Files,
    /// Final confirmation
    Review,
}

impl StepName {
    pub const ALL: [StepName; 6] = [
        StepName::BasicInfo,
        StepName::Hierarchy,
        StepName::Metadata,
        StepName::Security,
        StepName::Files,
        StepName::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::BasicInfo => "basic_info",
            StepName::Hierarchy => "hierarchy",
            StepName::Metadata => "metadata",
            StepName::Security => "security",
            StepName::Files => "files",
            StepName::Review => "review",
        }
    }
}

impl std::fmt::Display for StepName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepName {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        StepName::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| Error::UnknownStep(s.to_string()))
    }
}

/// Status of a workflow in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Workflow is accepting step updates
    #[default]
    Active,
    /// Workflow is parked by the backend
    Paused,
    /// Workflow produced its asset
    Completed,
    /// Workflow was abandoned
    Cancelled,
    /// Backend flagged the workflow as broken
    Error,
}

impl WorkflowStatus {
    /// Completed and cancelled workflows are discarded by the engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Completed | WorkflowStatus::Cancelled)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::Active => write!(f, "active"),
            WorkflowStatus::Paused => write!(f, "paused"),
            WorkflowStatus::Completed => write!(f, "completed"),
            WorkflowStatus::Cancelled => write!(f, "cancelled"),
            WorkflowStatus::Error => write!(f, "error"),
        }
    }
}

/// Authoritative record of one in-progress workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub id: WorkflowId,
    pub workflow_type: WorkflowType,
    pub current_step: StepName,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub data: WorkflowData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// A fresh active workflow positioned at `first_step`.
    pub fn new(
        id: WorkflowId,
        workflow_type: WorkflowType,
        first_step: StepName,
        data: WorkflowData,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workflow_type,
            current_step: first_step,
            status: WorkflowStatus::Active,
            data,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Autosave settings and bookkeeping for one active workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    #[serde(default)]
    pub save_in_progress: bool,
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
}

impl AutoSaveConfig {
    pub fn new(enabled: bool, interval_seconds: u64) -> Self {
        Self {
            enabled,
            interval_seconds,
            save_in_progress: false,
            last_saved: None,
        }
    }

    /// Tick period, never shorter than one second.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_seconds.max(1))
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self::new(true, DEFAULT_AUTOSAVE_INTERVAL_SECS)
    }
}

/// Ephemeral client-side handle for an active workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub workflow_id: WorkflowId,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub auto_save: AutoSaveConfig,
}

impl WorkflowSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
