//! Session phase machine.
//!
//! ```text
//! Idle → Initializing → Capturing(Before)
//!     → [ Executing(MovingToPick → Gripping → MovingToDrop → Releasing) ]*
//!     → Capturing(After) → Resetting → Idle
//!
//! any active phase --Fail--> Resetting
//! ```
//!
//! The machine only tracks where a session is; the sequencer does the work
//! and reports each completed step as an event.

/// Which of the two picture sweeps is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureStage {
    /// Pictures used to locate objects and containers.
    Before,
    /// Pictures used for the overview after sorting.
    After,
}

/// One pick-and-place step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStep {
    MovingToPick,
    Gripping,
    MovingToDrop,
    Releasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Initializing,
    Capturing(CaptureStage),
    Executing(ExecutionStep),
    Resetting,
}

impl SessionPhase {
    /// True while a session is in progress and can still fail.
    pub const fn is_active(self) -> bool {
        !matches!(self, SessionPhase::Idle | SessionPhase::Resetting)
    }
}

/// Events reported by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session requested.
    Start,
    /// Session opened and start pose reached.
    PoseReady,
    /// Another pick/drop pair is pending (the previous one, if any, has
    /// been released).
    NextCommand,
    /// Every pair has been released (or there were none).
    CommandsExhausted,
    PickReached,
    Gripped,
    DropReached,
    /// After-sweep finished.
    AfterCaptured,
    /// Arm returned home and released.
    ResetComplete,
    /// Any failure while a session is active.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    Ok(SessionPhase),
    Rejected(&'static str),
}

#[derive(Debug, Clone, Default)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    /// Pick/drop pairs completed in the current session.
    commands_completed: usize,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[inline]
    pub const fn commands_completed(&self) -> usize {
        self.commands_completed
    }

    pub fn handle_event(&mut self, event: SessionEvent) -> SessionTransition {
        use CaptureStage::{After, Before};
        use ExecutionStep as X;
        use SessionEvent as E;
        use SessionPhase as P;

        let next = match (self.phase, event) {
            (P::Idle, E::Start) => {
                self.commands_completed = 0;
                P::Initializing
            }
            (P::Initializing, E::PoseReady) => P::Capturing(Before),

            (P::Capturing(Before), E::NextCommand) => P::Executing(X::MovingToPick),
            (P::Capturing(Before), E::CommandsExhausted) => P::Capturing(After),

            (P::Executing(X::MovingToPick), E::PickReached) => P::Executing(X::Gripping),
            (P::Executing(X::Gripping), E::Gripped) => P::Executing(X::MovingToDrop),
            (P::Executing(X::MovingToDrop), E::DropReached) => P::Executing(X::Releasing),
            // Leaving Releasing means the magnet is off and the pair is done.
            (P::Executing(X::Releasing), E::NextCommand) => {
                self.commands_completed += 1;
                P::Executing(X::MovingToPick)
            }
            (P::Executing(X::Releasing), E::CommandsExhausted) => {
                self.commands_completed += 1;
                P::Capturing(After)
            }

            (P::Capturing(After), E::AfterCaptured) => P::Resetting,

            (s, E::Fail) if s.is_active() => P::Resetting,

            (P::Resetting, E::ResetComplete) => P::Idle,

            _ => return SessionTransition::Rejected("invalid session transition"),
        };

        self.phase = next;
        SessionTransition::Ok(next)
    }
}
