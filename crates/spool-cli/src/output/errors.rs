//! Error message formatting with actionable suggestions.

use std::error::Error;

use spool_core::error::SpoolError;

use super::colors::ColorSupport;

/// Error formatter with codes and suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Create a formatter; `colors = false` never colors
    pub fn new(colors: bool) -> Self {
        Self::with_colors(ColorSupport::detect_unless(!colors))
    }

    pub fn with_colors(colors: ColorSupport) -> Self {
        Self { colors }
    }

    /// Format an error with its code, a suggestion and the source chain
    pub fn format_error(&self, error: &SpoolError) -> String {
        let mut output = String::new();

        output.push_str(&self.colors.red("error"));
        output.push_str(&format!("[{}]: ", error.code()));
        output.push_str(&error.to_string());
        output.push('\n');

        if let SpoolError::TomlParse { line, column, .. } = error {
            if *line > 0 {
                output.push_str(&format!(
                    "  {} line {}, column {}\n",
                    self.colors.dim("-->"),
                    line,
                    column
                ));
            }
        }

        if let Some(suggestion) = error.suggestion() {
            output.push('\n');
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
            output.push('\n');
        }

        let mut source = error.source();
        while let Some(err) = source {
            output.push('\n');
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&err.to_string());
            source = err.source();
        }

        output
    }
}
