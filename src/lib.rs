//! Adaptive challenge orchestration for vocabulary practice.
//!
//! Six practice modes decide which word comes next, in which quiz format and at
//! what difficulty, and whether the session may continue. An optional AI
//! advisor can override the baseline choice; every failure on that path falls
//! back to the baseline.

pub mod adapter;
pub mod config;
pub mod corpus;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod mastery;
pub mod modes;
pub mod openai;
pub mod progression;
pub mod protocol;
pub mod routes;
pub mod seeds;
pub mod selector;
pub mod state;
pub mod telemetry;
pub mod util;

pub use adapter::{ChallengeService, ModeAdapter};
pub use domain::{ChallengeConfig, ChallengeContext, ChallengeMode, ChallengeResult, CompletionResult, QuizMode, Word, WordProgress};
pub use error::{EngineError, EngineResult};
pub use state::{AppState, SessionManager};
