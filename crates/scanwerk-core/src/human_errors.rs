// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people photographing sheets —
// teachers and students with a phone camera, not imaging engineers.
//
// Every technical error is mapped to plain English with a clear suggestion,
// usually "how to retake the photo".

use crate::error::ScanwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Disk or environment blip — safe to retry as-is.
    Transient,
    /// User must do something (usually retake the photo).
    ActionRequired,
    /// Cannot be fixed by retrying or retaking — bad file, wrong format.
    Permanent,
}

/// A human-readable error with plain English message and actionable
/// suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying the same input could succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in a hosting UI).
    pub severity: Severity,
}

/// Convert a `ScanwerkError` into guidance a phone-camera user can act on.
pub fn humanize_error(err: &ScanwerkError) -> HumanError {
    match err {
        ScanwerkError::InsufficientMarkers { found, required } => HumanError {
            message: "We couldn't find the corner marks on the sheet.".into(),
            suggestion: format!(
                "Retake the photo with the whole sheet in frame and all corner marks visible. \
                 ({found} of {required} marks were found — check for shadows or fingers covering the corners.)"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::GeometryDegenerate(_) => HumanError {
            message: "The sheet looks too distorted in this photo.".into(),
            suggestion: "Hold the camera directly above the sheet, keep it flat, and retake the photo.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::NoUsableSegments { attempted } => HumanError {
            message: "None of the photos could be used.".into(),
            suggestion: format!(
                "All {attempted} photos failed to process. Retake them one page part at a time, \
                 in good light, with the paper edges visible."
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanwerkError::ImageError(_) => HumanError {
            message: "There's a problem with this image file.".into(),
            suggestion: "The file may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanwerkError::Io(_) => HumanError {
            message: "The file couldn't be read or written.".into(),
            suggestion: "Check there is disk space available and the file still exists, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanwerkError::Serialization(_) => HumanError {
            message: "A settings file couldn't be understood.".into(),
            suggestion: "The configuration file appears malformed. Restore it from a known-good copy.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Missing markers must tell the user to retake, not to retry.
    #[test]
    fn insufficient_markers_prompts_retake() {
        let err = ScanwerkError::InsufficientMarkers {
            found: 2,
            required: 4,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(human.suggestion.contains("Retake"));
    }

    /// IO faults are the only transient, auto-retriable class.
    #[test]
    fn io_errors_are_transient() {
        let err = ScanwerkError::Io(std::io::Error::other("disk hiccup"));
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }
}
