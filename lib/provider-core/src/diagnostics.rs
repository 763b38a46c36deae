//! Host-facing diagnostics
//!
//! Internally every hook returns a [`crate::Result`]. At the hook boundary,
//! errors are turned into diagnostics the host can display.

use crate::value::AttrPath;
use crate::{ErrorClass, ProviderError};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<AttrPath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: String::new(),
            path: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn at(mut self, path: impl Into<AttrPath>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl From<&ProviderError> for Diagnostic {
    fn from(err: &ProviderError) -> Self {
        let summary = match err.class() {
            ErrorClass::NotFound => "Resource not found",
            ErrorClass::Forbidden => "Permission denied",
            ErrorClass::Transient => "Vendor API temporarily unavailable",
            ErrorClass::Invalid => "Invalid request",
            ErrorClass::Timeout => "Timeout",
            ErrorClass::Cancelled => "Operation cancelled",
            ErrorClass::Fatal => "Provider error",
        };
        let diag = Diagnostic::error(summary).with_detail(err.to_string());
        match err.attribute_path() {
            Some(path) => diag.at(AttrPath::parse(path)),
            None => diag,
        }
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        Diagnostic::from(&err)
    }
}

/// Ordered collection of diagnostics
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn error(&mut self, err: &ProviderError) {
        self.0.push(Diagnostic::from(err));
    }

    pub fn warn(&mut self, summary: impl Into<String>, path: impl Into<AttrPath>) {
        self.0.push(Diagnostic::warning(summary).at(path));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VendorError;

    #[test]
    fn test_error_adapter_keeps_path() {
        let err = ProviderError::invalid_attribute("auto_upgrade.0.enable", "bad");
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.path, Some(AttrPath::parse("auto_upgrade.0.enable")));
    }

    #[test]
    fn test_vendor_error_summary() {
        let err = ProviderError::from(VendorError::new(403, "permissions_denied", "nope"));
        let diag = Diagnostic::from(err);
        assert_eq!(diag.summary, "Permission denied");
        assert!(diag.detail.contains("nope"));
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.warn("kubeconfig unavailable", "kubeconfig");
        assert!(!diags.has_errors());
        assert_eq!(diags.warnings().count(), 1);
        diags.push(Diagnostic::error("boom"));
        assert!(diags.has_errors());
    }
}
