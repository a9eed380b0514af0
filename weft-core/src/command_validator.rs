//! Command validation before execution.

use crate::error::{Error, Result};

/// Checks command strings before the engine hands them to a shell.
///
/// The default validator only rejects empty commands. The strict validator
/// additionally refuses shell metacharacters, for callers that run
/// commands assembled from untrusted input.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    allow_shell: bool,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self { allow_shell: true }
    }
}

const SHELL_FEATURES: &[&str] = &[";", "&&", "||", "|", "`", "$", ">", "<"];

impl CommandValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator that disallows shell features.
    pub fn strict() -> Self {
        Self { allow_shell: false }
    }

    #[inline]
    pub fn is_strict(&self) -> bool {
        !self.allow_shell
    }

    /// Validates a command string before execution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCommand`] for an empty command, or for shell
    /// metacharacters in strict mode.
    pub fn validate(&self, command: &str) -> Result<()> {
        if command.trim().is_empty() {
            return Err(Error::InvalidCommand("command cannot be empty".to_string()));
        }

        if !self.allow_shell {
            if let Some(feature) = SHELL_FEATURES.iter().find(|f| command.contains(*f)) {
                return Err(Error::InvalidCommand(format!(
                    "'{}' uses the shell feature '{}', which strict mode forbids",
                    command, feature
                )));
            }
        }

        Ok(())
    }
}
