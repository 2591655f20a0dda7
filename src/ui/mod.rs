//! Terminal output helpers
//!
//! Styled output with `console`, spinners with `indicatif`, and plain
//! fallbacks when stdout is not a terminal or a CI environment is detected.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{intro, key_value, key_value_status, outro_success, step_info, step_ok, step_warn};
pub use progress::TaskSpinner;
