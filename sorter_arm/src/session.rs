//! Sorting sessions.
//!
//! - [`collaborators`] - Camera, inference, storage and control-plane seams
//! - [`state`] - Session phase machine
//! - [`sequencer`] - `SessionSequencer`: runs one session end to end
//! - [`storage`] - Session and recording folder layout

pub mod collaborators;
pub mod sequencer;
pub mod state;
pub mod storage;
