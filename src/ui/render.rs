//! Plain-text formatting for CLI listings.

use console::style;

use crate::models::{Interval, Suggestion};
use crate::workflow::StageState;

/// Seconds as `m:ss`, or `h:mm:ss` past the hour. Fractions are truncated.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Five-character flag column: `I A T S E`, a dot where the flag is unset.
pub fn flags_column(state: &StageState) -> String {
    [
        (state.info_fetched, 'I'),
        (state.audio_ready, 'A'),
        (state.transcript_ready, 'T'),
        (state.analyzed, 'S'),
        (state.has_exports, 'E'),
    ]
    .iter()
    .map(|(set, c)| if *set { *c } else { '.' })
    .collect()
}

/// One suggestion as a listing line.
///
/// `pending` is the buffered interval when it differs from the committed one.
pub fn suggestion_line(index: usize, suggestion: &Suggestion, pending: Option<Interval>) -> String {
    let mut line = format!(
        "{:>3}  {}-{}  {:>4.0}s  {}",
        index,
        format_clock(suggestion.start),
        format_clock(suggestion.end),
        suggestion.duration(),
        style(&suggestion.title).bold()
    );
    if let Some(p) = pending {
        line.push_str(&format!(
            "  {}",
            style(format!(
                "(pending {}-{})",
                format_clock(p.start),
                format_clock(p.end)
            ))
            .yellow()
        ));
    }
    line
}
