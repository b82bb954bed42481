//! Terminal status output.
//!
//! Status lines go to stderr so stdout stays reserved for the type checker's
//! forwarded output.

mod format;
mod messages;

pub use format::format_duration;
pub use messages::{error, info, success, warning};

use std::sync::atomic::{AtomicBool, Ordering};

static COLORS: AtomicBool = AtomicBool::new(true);

/// Check if color output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` enables them outside a TTY,
/// otherwise stderr must be an attended terminal.
pub fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

/// Decide once whether status lines are colored.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

pub fn colors_enabled() -> bool {
    COLORS.load(Ordering::Relaxed)
}
