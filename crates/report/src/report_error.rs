// ---------------------------------------------------------------------------
// ReportError: error types for report export and load
// ---------------------------------------------------------------------------

use std::fmt;

/// Errors that can occur while exporting or loading a crisis report.
#[derive(Debug)]
pub enum ReportError {
    /// I/O error (permission denied, disk full, missing file, etc.)
    Io(std::io::Error),
    /// JSON encoding failed.
    Encode(String),
    /// Bitcode, LZ4 or JSON decoding failed.
    Decode(String),
    /// The header is malformed or the checksum does not match.
    Corrupt(String),
    /// The file was written by a newer build.
    VersionMismatch { expected_max: u32, found: u32 },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "I/O error: {e}"),
            ReportError::Encode(msg) => write!(f, "Encoding error: {msg}"),
            ReportError::Decode(msg) => write!(f, "Decoding error: {msg}"),
            ReportError::Corrupt(msg) => write!(f, "Corrupt report file: {msg}"),
            ReportError::VersionMismatch {
                expected_max,
                found,
            } => write!(
                f,
                "Version mismatch: report is v{found}, but this build only reads up to v{expected_max}"
            ),
        }
    }
}

impl std::error::Error for ReportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReportError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        ReportError::Io(e)
    }
}

impl From<bitcode::Error> for ReportError {
    fn from(e: bitcode::Error) -> Self {
        ReportError::Decode(e.to_string())
    }
}

impl From<lz4_flex::block::DecompressError> for ReportError {
    fn from(e: lz4_flex::block::DecompressError) -> Self {
        ReportError::Decode(format!("lz4: {e}"))
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            ReportError::Io(e.into())
        } else {
            ReportError::Decode(e.to_string())
        }
    }
}

impl From<simulation::CrisisError> for ReportError {
    fn from(e: simulation::CrisisError) -> Self {
        ReportError::Encode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_error_display_io() {
        let err = ReportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        let msg = format!("{err}");
        assert!(msg.contains("I/O error"), "got: {msg}");
        assert!(msg.contains("file not found"), "got: {msg}");
    }

    #[test]
    fn test_report_error_display_version_mismatch() {
        let err = ReportError::VersionMismatch {
            expected_max: 1,
            found: 7,
        };
        let msg = format!("{err}");
        assert!(msg.contains("v7"), "got: {msg}");
        assert!(msg.contains("v1"), "got: {msg}");
    }

    #[test]
    fn test_report_error_from_io_keeps_source() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ReportError = io_err.into();
        assert!(matches!(err, ReportError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_json_syntax_error_is_decode() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{ not json");
        let err: ReportError = parse.unwrap_err().into();
        assert!(matches!(err, ReportError::Decode(_)));
    }
}
