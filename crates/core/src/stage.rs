//! Processing stage state machine.
//!
//! A job walks `pending_describe → describing_image → pending_translate →
//! translating_prompt → pending_edit → editing_image → uploading_result →
//! completed`, and may jump to `failed` from any non-terminal stage.
//!
//! Every non-terminal stage belongs to exactly one [`Step`]. A `pending_*`
//! stage is the resting form of a step and an `*_ing` stage is the claimed
//! form. `uploading_result` is both: it is written with the edited image
//! already in the payload, so it can be resumed directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Persisted value of `image_processing_jobs.current_stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PendingDescribe,
    DescribingImage,
    PendingTranslate,
    TranslatingPrompt,
    PendingEdit,
    EditingImage,
    UploadingResult,
    Completed,
    Failed,
}

/// Terminal stages. Jobs here are never claimed again.
pub const TERMINAL_STAGES: [Stage; 2] = [Stage::Completed, Stage::Failed];

impl Stage {
    /// Every stage, in pipeline order (`failed` last).
    pub const ALL: [Stage; 9] = [
        Stage::PendingDescribe,
        Stage::DescribingImage,
        Stage::PendingTranslate,
        Stage::TranslatingPrompt,
        Stage::PendingEdit,
        Stage::EditingImage,
        Stage::UploadingResult,
        Stage::Completed,
        Stage::Failed,
    ];

    /// Database representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::PendingDescribe => "pending_describe",
            Stage::DescribingImage => "describing_image",
            Stage::PendingTranslate => "pending_translate",
            Stage::TranslatingPrompt => "translating_prompt",
            Stage::PendingEdit => "pending_edit",
            Stage::EditingImage => "editing_image",
            Stage::UploadingResult => "uploading_result",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        TERMINAL_STAGES.contains(&self)
    }

    /// The pipeline step this stage belongs to, `None` for terminal stages.
    pub fn step(self) -> Option<Step> {
        match self {
            Stage::PendingDescribe | Stage::DescribingImage => Some(Step::Describe),
            Stage::PendingTranslate | Stage::TranslatingPrompt => Some(Step::Translate),
            Stage::PendingEdit | Stage::EditingImage => Some(Step::Edit),
            Stage::UploadingResult => Some(Step::Upload),
            Stage::Completed | Stage::Failed => None,
        }
    }

    /// Whether this is the claimed form of its step.
    ///
    /// `uploading_result` counts as in progress: while a lease is held on it
    /// an upload may be running.
    pub fn is_in_progress(self) -> bool {
        self.step().is_some_and(|step| step.in_progress_stage() == self)
    }

    /// Position along the pipeline. Both forms of a step share a rank;
    /// `completed` ranks after every step and `failed` above everything.
    pub fn rank(self) -> u8 {
        match self {
            Stage::Completed => Step::COUNT,
            Stage::Failed => u8::MAX,
            other => other.step().map(Step::index).unwrap_or(0),
        }
    }

    /// Whether the store may move a job from `self` to `next`.
    ///
    /// Allowed moves:
    /// - any non-terminal stage to `failed`;
    /// - within a step (claim, release, or re-claim after lease expiry);
    /// - to the next step only, never skipping one.
    pub fn can_transition_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Stage::Failed {
            return true;
        }
        let (from, to) = (self.rank(), next.rank());
        to == from || to == from + 1
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown processing stage '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One unit of work the executor performs against an external capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Describe,
    Translate,
    Edit,
    Upload,
}

impl Step {
    pub const COUNT: u8 = 4;

    pub fn index(self) -> u8 {
        match self {
            Step::Describe => 0,
            Step::Translate => 1,
            Step::Edit => 2,
            Step::Upload => 3,
        }
    }

    /// Resting stage: where the job waits before the step is claimed, and
    /// where it is released to after a retryable failure.
    pub fn pending_stage(self) -> Stage {
        match self {
            Step::Describe => Stage::PendingDescribe,
            Step::Translate => Stage::PendingTranslate,
            Step::Edit => Stage::PendingEdit,
            Step::Upload => Stage::UploadingResult,
        }
    }

    /// Stage written by the claim, before the capability is called.
    pub fn in_progress_stage(self) -> Stage {
        match self {
            Step::Describe => Stage::DescribingImage,
            Step::Translate => Stage::TranslatingPrompt,
            Step::Edit => Stage::EditingImage,
            Step::Upload => Stage::UploadingResult,
        }
    }

    /// Stage written when the step succeeds.
    pub fn next_stage(self) -> Stage {
        match self {
            Step::Describe => Stage::PendingTranslate,
            Step::Translate => Stage::PendingEdit,
            Step::Edit => Stage::UploadingResult,
            Step::Upload => Stage::Completed,
        }
    }

    /// Short verb used in logs and error messages.
    pub fn label(self) -> &'static str {
        match self {
            Step::Describe => "describe",
            Step::Translate => "translate",
            Step::Edit => "edit",
            Step::Upload => "upload",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
