pub mod icons;
pub mod progress;

pub use progress::{SessionProgressUI, print_session_summary};
