//! Element state flags, the transition state machine and emitted events.

use bitflags::bitflags;
use ripe_core::FrameKey;

bitflags! {
    /// Transient state of the configurator element, as seen by the widget
    /// shell around it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ElementState: u8 {
        /// A pointer drag (rotate or pan) is in progress
        const DRAG = 1 << 0;
        /// Dragging is refused
        const NO_DRAG = 1 << 1;
        /// A transition owns the camera
        const ANIMATING = 1 << 2;
        const CROSSFADING = 1 << 3;
        /// Hit testing is suspended
        const NO_RAYCAST = 1 << 4;
    }
}

/// Kind of a modal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Rotation,
    Crossfade,
    Recenter,
}

/// At most one transition runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionState {
    #[default]
    Idle,
    Rotating,
    Crossfading,
    Recentering,
}

impl TransitionState {
    pub fn is_idle(self) -> bool {
        self == TransitionState::Idle
    }

    /// Kind reported when this transition finishes.
    pub fn kind(self) -> Option<TransitionKind> {
        match self {
            TransitionState::Idle => None,
            TransitionState::Rotating => Some(TransitionKind::Rotation),
            TransitionState::Crossfading => Some(TransitionKind::Crossfade),
            TransitionState::Recentering => Some(TransitionKind::Recenter),
        }
    }

    /// Element flags implied by this state.
    pub fn flags(self) -> ElementState {
        match self {
            TransitionState::Idle => ElementState::empty(),
            TransitionState::Rotating | TransitionState::Recentering => {
                ElementState::ANIMATING | ElementState::NO_DRAG
            }
            TransitionState::Crossfading => {
                ElementState::ANIMATING | ElementState::NO_DRAG | ElementState::CROSSFADING
            }
        }
    }
}

/// Notifications drained by the owner of a renderer or configurator.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Assets loaded and the first frame is scheduled
    Ready,
    /// An update was requested before the assets were loaded
    NotLoaded,
    ChangedFrame(FrameKey),
    Highlighted(String),
    Lowlighted,
    /// A part was clicked
    Selected(String),
    TransitionFinished(TransitionKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_has_no_flags() {
        assert!(TransitionState::Idle.flags().is_empty());
        assert!(TransitionState::Idle.kind().is_none());
    }

    #[test]
    fn test_crossfade_flags() {
        let flags = TransitionState::Crossfading.flags();
        assert!(flags.contains(ElementState::ANIMATING | ElementState::NO_DRAG));
        assert!(flags.contains(ElementState::CROSSFADING));
        assert!(!TransitionState::Rotating.flags().contains(ElementState::CROSSFADING));
    }
}
