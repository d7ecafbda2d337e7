//! Progress event delivery.
//!
//! | Submodule | What it owns                                           |
//! |-----------|--------------------------------------------------------|
//! | `bus`     | `EventBus<E>`, `Subscription`, the process-wide bus    |

pub mod bus;

pub use bus::{EventBus, ProgressBus, Subscription, global_progress_bus};
pub use scribe_common::{PhaseProgress, ProgressEvent, SessionProgress};
