//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled                                              |
//! |------------|---------------------------------------------------------------|
//! | `session`  | `New`, `Run`, `Resume`, `Regenerate`, `Status`, `List`, `Delete` |
//! | `patterns` | `Patterns`                                                    |
//! | `config`   | `Config`                                                      |

pub mod config;
pub mod patterns;
pub mod session;

pub use config::cmd_config;
pub use patterns::cmd_patterns;
pub use session::{
    NewSessionArgs, cmd_delete, cmd_list, cmd_new, cmd_regenerate, cmd_resume, cmd_run,
    cmd_status,
};
