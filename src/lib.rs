//! Adaptive content selection for math practice.
//!
//! The engine decides which skill, level and concrete problem a learner sees next, keeps a
//! per-skill ability estimate up to date after every answer, tracks level mastery, rotates
//! through curated item banks and advises on breaks. It performs no I/O: the learner
//! profile is loaded and stored by the caller.

pub mod advance;
pub mod breaks;
pub mod classifier;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mastery;
pub mod profile;
pub mod rotation;
pub mod selection;
pub mod types;
pub mod updater;

pub use config::EngineConfig;
pub use engine::{AdaptiveEngine, AnswerOutcome};
pub use error::{EngineError, Result};
pub use profile::LearnerProfile;
pub use types::{Problem, SelectionConstraints, SkillId};
