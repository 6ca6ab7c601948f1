//! Terminal output for the CLI
//!
//! Uses `cliclack` log lines and spinners on an interactive terminal and
//! falls back to plain `[OK]`/`[FAIL]` lines in CI or when piped.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{
    intro, key_value, outro_error, outro_success, section, step_error, step_info, step_ok,
    step_warn_hint, worker_state,
};
pub use progress::TaskSpinner;
