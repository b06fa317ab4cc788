// ABOUTME: Diagnostics accumulator for non-fatal warnings during an update.
// ABOUTME: Collects warnings that shouldn't fail an update but should be shown to users.

use serde::Serialize;

/// Collects non-fatal warnings during update operations.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// The old image could not be removed after all containers were replaced.
    pub fn image_removal(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ImageRemoval,
            message: message.into(),
        }
    }

    /// Pruning dangling images failed.
    pub fn prune(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Prune,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Old image left behind (still tagged elsewhere, or the engine refused).
    ImageRemoval,
    /// Dangling images were not pruned.
    Prune,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_starts_empty() {
        let diag = Diagnostics::default();
        assert!(!diag.has_warnings());
        assert!(diag.warnings().is_empty());
    }

    #[test]
    fn diagnostics_collects_warnings() {
        let mut diag = Diagnostics::default();

        diag.warn(Warning::image_removal("image is referenced by another tag"));
        diag.warn(Warning::prune("engine busy"));

        assert!(diag.has_warnings());
        assert_eq!(diag.into_warnings().len(), 2);
    }

    #[test]
    fn warning_constructors_set_correct_kind() {
        assert_eq!(Warning::image_removal("x").kind, WarningKind::ImageRemoval);
        assert_eq!(Warning::prune("x").kind, WarningKind::Prune);
    }
}
