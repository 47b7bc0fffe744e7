//! Interview session orchestration
//!
//! This module holds the conversational recording session:
//! - The phase/message data model
//! - Themes and the scripted follow-up fallback
//! - The `InterviewMachine` state machine (pure event intake)
//! - The `SessionRunner` tokio task that owns a machine, its capture
//!   rig, timer, draft interval, and collaborator calls

mod event;
mod machine;
mod message;
mod phase;
mod runner;
mod theme;

pub use event::{Effect, SessionEvent};
pub use machine::InterviewMachine;
pub use message::{full_transcript, AudioRef, Message, MessageKind, Speaker};
pub use phase::Phase;
pub use runner::{SessionDeps, SessionHandle, SessionRunner, SessionSnapshot};
pub use theme::{
    builtin_themes, deferred_theme, interviewer_instructions, ScriptedFollowUps, Theme,
};
