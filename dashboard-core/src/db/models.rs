//! Row models for every table in the data model (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `job_type ∈ {transcode, cleanup}` are the only kinds ever dispatched to
/// workers; `Rename Job` and `Quality Mismatch` are internal (§3, §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Transcode,
    Cleanup,
    #[serde(rename = "Rename Job")]
    RenameJob,
    #[serde(rename = "Quality Mismatch")]
    QualityMismatch,
}

impl JobType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobType::Transcode => "transcode",
            JobType::Cleanup => "cleanup",
            JobType::RenameJob => "Rename Job",
            JobType::QualityMismatch => "Quality Mismatch",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "transcode" => Some(JobType::Transcode),
            "cleanup" => Some(JobType::Cleanup),
            "Rename Job" => Some(JobType::RenameJob),
            "Quality Mismatch" => Some(JobType::QualityMismatch),
            _ => None,
        }
    }

    /// Internal job kinds are never dispatched to workers (§3 invariant).
    pub fn is_internal(&self) -> bool {
        matches!(self, JobType::RenameJob | JobType::QualityMismatch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    AwaitingApproval,
    Encoding,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::AwaitingApproval => "awaiting_approval",
            JobStatus::Encoding => "encoding",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "awaiting_approval" => Some(JobStatus::AwaitingApproval),
            "encoding" => Some(JobStatus::Encoding),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Booting,
    Idle,
    Running,
    Encoding,
    Cleaning,
    Renaming,
    Paused,
    Finishing,
    Offline,
}

impl NodeStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            NodeStatus::Booting => "booting",
            NodeStatus::Idle => "idle",
            NodeStatus::Running => "running",
            NodeStatus::Encoding => "encoding",
            NodeStatus::Cleaning => "cleaning",
            NodeStatus::Renaming => "renaming",
            NodeStatus::Paused => "paused",
            NodeStatus::Finishing => "finishing",
            NodeStatus::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCommand {
    Idle,
    Running,
    Paused,
    Quit,
}

impl NodeCommand {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            NodeCommand::Idle => "idle",
            NodeCommand::Running => "running",
            NodeCommand::Paused => "paused",
            NodeCommand::Quit => "quit",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(NodeCommand::Idle),
            "running" => Some(NodeCommand::Running),
            "paused" => Some(NodeCommand::Paused),
            "quit" => Some(NodeCommand::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Node {
    pub hostname: String,
    #[serde(skip_serializing)]
    pub session_token: String,
    pub version: String,
    pub status: String,
    pub command: String,
    pub last_heartbeat: DateTime<Utc>,
    pub connected_at: DateTime<Utc>,
    pub progress: f64,
    pub fps: Option<f64>,
    pub current_file: Option<String>,
    pub total_duration: Option<f64>,
    pub job_start_time: Option<DateTime<Utc>>,
}

impl Node {
    pub fn is_live(&self, freshness_window: chrono::Duration) -> bool {
        Utc::now() - self.last_heartbeat <= freshness_window
    }
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Job {
    pub id: i64,
    pub filepath: String,
    pub job_type: String,
    pub status: String,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Value,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct EncodedFile {
    pub id: i64,
    pub filepath: String,
    pub original_size: i64,
    pub new_size: i64,
    pub worker_hostname: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct FailedFile {
    pub id: i64,
    pub filepath: String,
    pub job_type: String,
    pub reason: Option<String>,
    pub log: Option<String>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MediaSourceType {
    pub source_name: String,
    pub scanner_type: String,
    pub media_type: String,
    pub is_hidden: bool,
}
