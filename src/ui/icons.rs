//! Emoji used across the CLI output, with plain-text fallbacks for
//! terminals that cannot render them.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "[SKIP]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");

// Workflow indicators
pub static RUNNING: Emoji<'_, '_> = Emoji("▶️  ", "[>]");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏱️  ", "[T]");
pub static SCISSORS: Emoji<'_, '_> = Emoji("✂️  ", "[CLIP]");
pub static FILM: Emoji<'_, '_> = Emoji("🎬 ", "[VIDEO]");
