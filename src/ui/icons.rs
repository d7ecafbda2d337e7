//! Shared UI icons.
//!
//! Each icon carries a plain-text fallback for terminals without emoji.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Session indicators
pub static PEN: Emoji<'_, '_> = Emoji("✍️  ", "[>]");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
pub static STOP: Emoji<'_, '_> = Emoji("⏹️  ", "[STOP]");
