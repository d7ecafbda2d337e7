//! Resumable multi-phase content generation.
//!
//! A session walks a pattern's phases in order, asking a text generator for
//! each phase, validating the result against the phase's rules and feeding
//! violations back on retry. Every status change is persisted, so an
//! interrupted session resumes where it stopped.
//!
//! | Module         | What it owns                                             |
//! |----------------|----------------------------------------------------------|
//! | `orchestrator` | sessions, the phase coordinator, the run context, storage |
//! | `validation`   | `ContentValidator` and its rules                         |
//! | `events`       | the progress event bus                                   |
//! | `generation`   | `TextGenerator` and its HTTP and command clients         |
//! | `prompt`       | prompt rendering and output formatting                   |
//! | `pattern`      | pattern catalog, built-in and on disk                    |
//! | `config`       | `scribe.toml` and environment overrides                  |
//! | `logging`      | tracing subscriber setup                                 |
//! | `ui`           | terminal progress rendering                              |

pub mod config;
pub mod errors;
pub mod events;
pub mod generation;
pub mod logging;
pub mod orchestrator;
pub mod pattern;
pub mod prompt;
pub mod ui;
pub mod validation;
