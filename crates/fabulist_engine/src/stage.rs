//! Storyboard Stage State Machine.
//!
//! ```text
//! CREATED --text rendered--> RENDERED --media dispatched--> GEN_IMAGE | GEN_VIDEO | GEN_AUDIO
//! GEN_* --media settled--> FINISHED --publish--> PUBLISHED
//! any stage but PUBLISHED --cancel--> UNSPECIFIED
//! ```
//!
//! A regenerated text render may also leave RENDERED or FINISHED for
//! RENDERED, and FINISHED boards may dispatch media again.

use fabulist_core::{BoardStage, GenType, Storyboard};
use fabulist_error::{ValidationError, ValidationErrorKind};
use serde::{Deserialize, Serialize};

/// Something that moves a board between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StageEvent {
    /// A text-generation task finished and its scenes were stored
    TextRendered,
    /// Per-scene media tasks of this kind were dispatched
    MediaDispatched(GenType),
    /// No scene of the board is generating any more
    MediaSettled,
    /// Explicit publish
    Publish,
    /// Explicit cancel
    Cancel,
}

/// Stage reached from `from` on `event`, or `None` if not permitted.
pub fn next_stage(from: BoardStage, event: StageEvent) -> Option<BoardStage> {
    use BoardStage::*;
    match (from, event) {
        (Published, _) => None,
        (_, StageEvent::Cancel) => Some(Unspecified),
        (Created | Rendered | Finished, StageEvent::TextRendered) => Some(Rendered),
        (Rendered | Finished, StageEvent::MediaDispatched(kind)) => match kind {
            GenType::Image => Some(GenImage),
            GenType::Video => Some(GenVideo),
            GenType::Audio => Some(GenAudio),
            GenType::Text => None,
        },
        (GenImage | GenVideo | GenAudio, StageEvent::MediaSettled) => Some(Finished),
        (Finished, StageEvent::Publish) => Some(Published),
        _ => None,
    }
}

/// Stage `board` moves to on `event`.
///
/// # Errors
///
/// `BoardPublished` for a published board, `BoardCancelled` for a cancelled
/// one (other than a repeated cancel), and `InvalidTransition` otherwise.
#[track_caller]
pub fn transition(board: &Storyboard, event: StageEvent) -> Result<BoardStage, ValidationError> {
    if let Some(stage) = next_stage(board.stage, event) {
        return Ok(stage);
    }
    let kind = match board.stage {
        BoardStage::Published => ValidationErrorKind::BoardPublished(board.id.get()),
        BoardStage::Unspecified => ValidationErrorKind::BoardCancelled(board.id.get()),
        from => ValidationErrorKind::InvalidTransition {
            from: from.to_string(),
            event: event.to_string(),
        },
    };
    Err(ValidationError::new(kind))
}

/// Where a board's pipeline picks up again, derived from its stage alone.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResumePoint {
    /// Text has not been rendered yet
    RenderText,
    /// Text is rendered; media can be dispatched
    GenerateMedia,
    /// Media of this kind is in flight; settle once scenes finish
    AwaitMedia(GenType),
    /// Everything is rendered; the board can be published
    Publish,
    /// Published; nothing left to do
    Done,
    /// Cancelled; nothing left to do
    Cancelled,
}

impl ResumePoint {
    /// Resume point for a stage.
    pub fn from_stage(stage: BoardStage) -> Self {
        match stage {
            BoardStage::Created => Self::RenderText,
            BoardStage::Rendered => Self::GenerateMedia,
            BoardStage::GenImage => Self::AwaitMedia(GenType::Image),
            BoardStage::GenVideo => Self::AwaitMedia(GenType::Video),
            BoardStage::GenAudio => Self::AwaitMedia(GenType::Audio),
            BoardStage::Finished => Self::Publish,
            BoardStage::Published => Self::Done,
            BoardStage::Unspecified => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_happy_path() {
        let mut stage = BoardStage::Created;
        for event in [
            StageEvent::TextRendered,
            StageEvent::MediaDispatched(GenType::Image),
            StageEvent::MediaSettled,
            StageEvent::Publish,
        ] {
            stage = next_stage(stage, event).unwrap();
        }
        assert_eq!(stage, BoardStage::Published);
    }

    #[test]
    fn test_published_is_terminal() {
        for event in [
            StageEvent::TextRendered,
            StageEvent::MediaDispatched(GenType::Image),
            StageEvent::MediaSettled,
            StageEvent::Publish,
            StageEvent::Cancel,
        ] {
            assert_eq!(next_stage(BoardStage::Published, event), None);
        }
    }

    #[test]
    fn test_cancel_from_every_other_stage() {
        for stage in BoardStage::iter().filter(|s| *s != BoardStage::Published) {
            assert_eq!(
                next_stage(stage, StageEvent::Cancel),
                Some(BoardStage::Unspecified)
            );
        }
    }

    #[test]
    fn test_publish_requires_finished() {
        for stage in BoardStage::iter().filter(|s| *s != BoardStage::Finished) {
            assert_eq!(next_stage(stage, StageEvent::Publish), None);
        }
    }

    #[test]
    fn test_media_cannot_dispatch_before_text() {
        assert_eq!(
            next_stage(BoardStage::Created, StageEvent::MediaDispatched(GenType::Image)),
            None
        );
        assert_eq!(
            next_stage(BoardStage::Rendered, StageEvent::MediaDispatched(GenType::Text)),
            None
        );
    }

    #[test]
    fn test_resume_points() {
        assert_eq!(
            ResumePoint::from_stage(BoardStage::Created),
            ResumePoint::RenderText
        );
        assert_eq!(
            ResumePoint::from_stage(BoardStage::GenImage),
            ResumePoint::AwaitMedia(GenType::Image)
        );
        assert_eq!(
            ResumePoint::from_stage(BoardStage::Unspecified),
            ResumePoint::Cancelled
        );
    }
}
