//! Pipeline state machine

use crate::error::TrackError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Loading,
    Training,
    Evaluating,
    Persisting,
    Done,
    Failed,
}

impl PipelineState {
    fn ordinal(self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Loading => 1,
            PipelineState::Training => 2,
            PipelineState::Evaluating => 3,
            PipelineState::Persisting => 4,
            PipelineState::Done => 5,
            PipelineState::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Transitions only move forward; `Failed` is reachable from any
    /// non-terminal state.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            PipelineState::Failed => true,
            PipelineState::Idle => false,
            _ => next.ordinal() > self.ordinal(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Loading => "loading",
            PipelineState::Training => "training",
            PipelineState::Evaluating => "evaluating",
            PipelineState::Persisting => "persisting",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error raised by a collaborator, tagged with the stage it stopped
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: PipelineState,
    #[source]
    pub source: TrackError,
}

impl StageError {
    /// The underlying error, unchanged
    pub fn error(&self) -> &TrackError {
        &self.source
    }

    pub fn into_inner(self) -> TrackError {
        self.source
    }
}
