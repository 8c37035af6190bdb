//! # Terminal Output
//!
//! Decides whether the CLI may use color, emoji and live progress bars.
//!
//! Honoured settings, strongest first:
//! - `--color=always|never|auto`
//! - `NO_COLOR` (any value) disables color, see https://no-color.org/
//! - `CLICOLOR=0` disables color, `CLICOLOR_FORCE=1` forces it
//! - `TERM=dumb` disables color
//!
//! ```rust
//! use buckaroo::output::{status, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("never");
//! assert_eq!(status(&config, "✅", "[OK]"), "[OK]");
//! ```

use std::env;

use console::{style, Term};

/// Output configuration for controlling colors, emoji and progress bars.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emoji should be used in output.
    pub use_color: bool,
    /// Whether stderr is an interactive terminal that can host a progress bar.
    pub interactive: bool,
}

impl OutputConfig {
    /// Build the configuration from the `--color` flag and the environment.
    ///
    /// `always` forces color on even when `NO_COLOR` is set; `never` forces
    /// it off; anything else detects support from the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self {
            use_color,
            interactive: Term::stderr().is_term(),
        }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        Term::stdout().features().colors_supported()
    }

    /// Whether a live progress bar should be drawn
    pub fn show_progress(&self) -> bool {
        self.use_color && self.interactive
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self {
            use_color: true,
            interactive: false,
        }
    }

    pub fn without_color() -> Self {
        Self {
            use_color: false,
            interactive: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Emoji when color is enabled, the plain marker otherwise.
pub fn status<'a>(config: &OutputConfig, emoji: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji
    } else {
        plain
    }
}

/// `text` in bold when color is enabled
pub fn emphasis(config: &OutputConfig, text: &str) -> String {
    if config.use_color {
        style(text).bold().to_string()
    } else {
        text.to_string()
    }
}
