pub mod icons;
pub mod progress;
pub mod render;

pub use progress::StageProgress;
pub use render::{flags_column, format_clock, suggestion_line};
