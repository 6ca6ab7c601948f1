//! Terminal detection for CLI output

use std::io::IsTerminal;

/// CI environment indicators
const CI_VARS: [&str; 6] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "TF_BUILD",
];

/// Decides between rich terminal output and plain lines
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        let tty = std::io::stdout().is_terminal();
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        Self {
            interactive: tty && !ci,
        }
    }

    /// Plain output regardless of environment
    pub fn plain() -> Self {
        Self { interactive: false }
    }

    /// Whether to use spinners and the rich log style
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }
}
