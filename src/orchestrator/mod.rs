//! Orchestration core: sessions, phases and the run-scoped context.
//!
//! | Submodule     | What it owns                                              |
//! |---------------|-----------------------------------------------------------|
//! | `session`     | `SessionOrchestrator`, lifecycle and the execution loop   |
//! | `coordinator` | `PhaseCoordinator`, one phase with retry and feedback     |
//! | `context`     | `GenerationContext`, `PhaseLocalContext`                  |
//! | `outline`     | splitting outlines and beats across phases                |
//! | `store`       | `SessionStore`, `JsonSessionStore`                        |

pub mod context;
pub mod coordinator;
pub mod outline;
pub mod session;
pub mod store;

pub use context::{CompletedPhase, GenerationContext, PhaseLocalContext};
pub use coordinator::{CoordinatorSettings, GeneratedPhase, PhaseCoordinator};
pub use session::{SessionOrchestrator, content_path};
pub use store::{JsonSessionStore, SessionStore};
