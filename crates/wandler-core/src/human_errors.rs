// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for front-ends.
//
// Every pipeline error is mapped to plain English with a clear suggestion.
// Nothing here is fatal: the pipeline keeps no state, so the user can always
// pick another file or operation and try again.

use crate::error::ConvertError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again may work (disk hiccup, partial page output).
    Transient,
    /// User must choose differently (another operation or file).
    ActionRequired,
    /// The file itself is unusable.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether re-running the same conversion could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `ConvertError` into a `HumanError` suitable for display.
pub fn humanize_error(err: &ConvertError) -> HumanError {
    match err {
        ConvertError::Decode(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or not the type its name suggests. Try opening it in another app first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ConvertError::FormatNotEnabled(media_type) => HumanError {
            message: format!("{} files can't be handled in this build.", media_type.label()),
            suggestion: format!(
                "Convert the file to JPEG on your device first, or use a build with {} support.",
                media_type.label()
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ConvertError::Encode(detail) => HumanError {
            message: "We couldn't create the converted file.".into(),
            suggestion: format!("Try a different output format. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ConvertError::DocumentFormat(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it in a PDF viewer to check it works, or try a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ConvertError::PageRender { page_index, .. } => HumanError {
            message: format!("Page {} of this PDF couldn't be converted.", page_index + 1),
            suggestion: "Pages before it were still converted. The remaining pages may use content we can't draw.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        ConvertError::UnsupportedOperation(detail) => HumanError {
            message: "That conversion doesn't fit this file.".into(),
            suggestion: format!("Pick a conversion that starts from your file's type. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ConvertError::Config(detail) => HumanError {
            message: "The settings file isn't valid.".into(),
            suggestion: format!("Fix or remove the settings file, then try again. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ConvertError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "We don't have permission to read or write that file.".into(),
                    suggestion: "Check the file permissions, or choose a different output folder.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        ConvertError::Serialization(_) => HumanError {
            message: "Saved data couldn't be read.".into(),
            suggestion: "Try again. Resetting the statistics will clear the damaged file.".into(),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}
