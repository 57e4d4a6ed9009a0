//! Terminal output formatting and utilities.
//!
//! Keeps output consistent across commands: results go to stdout,
//! diagnostics to stderr.

pub mod colors;
pub mod errors;

/// Output handler for consistent terminal formatting
pub struct OutputHandler {
    colors: colors::ColorSupport,
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new(no_color: bool) -> Self {
        Self {
            colors: colors::ColorSupport::detect_unless(no_color),
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        println!("{}", self.colors.dim(message));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        println!("{} {}", self.colors.green("✓"), message);
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", self.colors.yellow("⚠"), message);
    }

    /// Print a key/value line
    pub fn field(&self, key: &str, value: &str) {
        println!("{} {}", self.colors.bold(&format!("{}:", key)), value);
    }

    /// Print a result line without decoration
    pub fn plain(&self, message: &str) {
        println!("{}", message);
    }
}
