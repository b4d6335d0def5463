//! Status transition policies.
//!
//! The lifecycle manager asks a single [`TransitionPolicy`] whether a status
//! change is allowed. Swapping the policy changes the state machine without
//! touching the manager.

use crate::error::ReportError;
use crate::report::ReportStatus;
use std::str::FromStr;

/// Validates a status change.
pub trait TransitionPolicy: Send + Sync {
    /// Accept or reject the move from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::InvalidTransition`] when the move is rejected.
    fn check(&self, from: ReportStatus, to: ReportStatus) -> Result<(), ReportError>;

    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;
}

/// Accepts every transition, including moves back to `OPEN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveTransitions;

impl TransitionPolicy for PermissiveTransitions {
    fn check(&self, _from: ReportStatus, _to: ReportStatus) -> Result<(), ReportError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "permissive"
    }
}

/// Only allows moving forward along `OPEN → IN_PROGRESS → RESOLVED`.
///
/// Skipping a step and re-asserting the current status are allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardOnlyTransitions;

const fn rank(status: ReportStatus) -> u8 {
    match status {
        ReportStatus::Open => 0,
        ReportStatus::InProgress => 1,
        ReportStatus::Resolved => 2,
    }
}

impl TransitionPolicy for ForwardOnlyTransitions {
    fn check(&self, from: ReportStatus, to: ReportStatus) -> Result<(), ReportError> {
        if rank(to) < rank(from) {
            return Err(ReportError::InvalidTransition { from, to });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "forward-only"
    }
}

/// Configuration selector for a transition policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransitionMode {
    /// [`PermissiveTransitions`]
    #[default]
    Permissive,
    /// [`ForwardOnlyTransitions`]
    ForwardOnly,
}

impl TransitionMode {
    /// Instantiate the selected policy.
    #[must_use]
    pub fn policy(self) -> Box<dyn TransitionPolicy> {
        match self {
            Self::Permissive => Box::new(PermissiveTransitions),
            Self::ForwardOnly => Box::new(ForwardOnlyTransitions),
        }
    }
}

impl FromStr for TransitionMode {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "forward-only" | "forward_only" | "strict" => Ok(Self::ForwardOnly),
            other => Err(ReportError::validation(format!(
                "unknown transition mode: {other}"
            ))),
        }
    }
}
