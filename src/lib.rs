//! Helmsman - workflow and scheduling engine for hybrid Agile/Waterfall projects.
//!
//! This library provides the core functionality for the `hm` CLI tool:
//! board transition gating, the sprint lifecycle, and dependency-driven
//! phase/task scheduling with a WBS outline.

pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod storage;

use models::SprintStatus;


/// Coarse classification of [`Error`] for callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A guard rejected the operation; user action is required
    Precondition,
    /// Entity missing or outside the caller's project
    NotFound,
    /// Blocked by another entity's state
    Conflict,
    /// Malformed arguments
    InvalidInput,
    /// Store or filesystem failure
    Infrastructure,
}

/// Library-level error type for Helmsman operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not initialized: run `hm system init` first")]
    NotInitialized,

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dependency {predecessor} -> {successor} would create a cycle")]
    CycleDetected { predecessor: i64, successor: i64 },

    #[error("Column '{column}' has reached its WIP limit of {limit}")]
    WipLimitReached { column: String, limit: u32 },

    #[error("Definition of Done incomplete: {incomplete} checklist item(s) unchecked")]
    DefinitionOfDoneIncomplete { incomplete: usize },

    #[error("Sprint '{sprint}' is {actual}, expected {expected}")]
    InvalidSprintState {
        sprint: String,
        expected: SprintStatus,
        actual: SprintStatus,
    },

    #[error("Sprint '{active}' is already active in this project")]
    SprintAlreadyActive { active: String },

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Classify the error into the domain taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::CycleDetected { .. }
            | Error::WipLimitReached { .. }
            | Error::DefinitionOfDoneIncomplete { .. }
            | Error::InvalidSprintState { .. }
            | Error::Precondition(_) => ErrorKind::Precondition,
            Error::SprintAlreadyActive { .. } | Error::Conflict(_) => ErrorKind::Conflict,
            Error::Io(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::NotInitialized
            | Error::Other(_) => ErrorKind::Infrastructure,
        }
    }
}

/// Result type alias for Helmsman operations.
pub type Result<T> = std::result::Result<T, Error>;
