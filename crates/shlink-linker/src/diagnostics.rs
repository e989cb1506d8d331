//! The program info log.

use std::fmt;

use crate::error::{ErrorKind, Halt, LinkError};

/// Severity of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// One line of the info log.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub kind: ErrorKind,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Diagnostics collected while linking a program.
///
/// Rendered with `Display`, each entry becomes one line prefixed with
/// `error: ` or `warning: `.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InfoLog {
    entries: Vec<LogEntry>,
}

impl InfoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error and returns the marker a failing phase propagates.
    pub fn error(&mut self, err: LinkError) -> Halt {
        log::debug!("link error: {err}");
        self.entries.push(LogEntry {
            severity: Severity::Error,
            kind: err.kind(),
            message: err.to_string(),
        });
        Halt
    }

    /// Records a warning. Warnings never fail a link.
    pub fn warning(&mut self, err: LinkError) {
        log::warn!("{err}");
        self.entries.push(LogEntry {
            severity: Severity::Warning,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn errors(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Returns `true` if any entry's message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    /// Returns `Err(Halt)` if errors were logged since `mark` was taken
    /// from [`InfoLog::error_count`].
    pub(crate) fn halt_if_errors_since(&self, mark: usize) -> Result<(), Halt> {
        if self.error_count() > mark { Err(Halt) } else { Ok(()) }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for InfoLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shlink_ir::Stage;

    #[test]
    fn renders_prefixed_lines() {
        let mut log = InfoLog::new();
        let _ = log.error(LinkError::MultiplyDefined("foo".into()));
        log.warning(LinkError::UniformComponentsOverLimit(Stage::Vertex));
        let text = log.to_string();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "error: function `foo' is multiply defined");
        assert!(lines[1].starts_with("warning: Too many vertex shader uniform components"));
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut log = InfoLog::new();
        log.warning(LinkError::TooManySamplers(Stage::Fragment));
        assert!(!log.has_errors());
        assert_eq!(log.warnings().count(), 1);
        assert!(log.halt_if_errors_since(0).is_ok());
        let _ = log.error(LinkError::VersionMismatch);
        assert_eq!(log.halt_if_errors_since(0), Err(Halt));
        assert_eq!(log.entries()[1].kind, ErrorKind::Version);
    }
}
