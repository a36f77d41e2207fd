//! Error type shared by every pipeline stage.
//!
//! Stages never terminate the process themselves. They return an `AppError`
//! and the binary decides how to exit (see `src/main.rs`).

/// Failure category of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input tables, invalid run parameters, inconsistent phase files.
    Configuration,
    /// The packing engine could not place every grain.
    Packing,
    /// The tessellation engine could not fill the grid.
    Tessellation,
    /// Voxel labels that do not match the grain table (corruption between stages).
    Reconciliation,
    /// Filesystem or serialization failures.
    Io,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Configuration => 2,
            ErrorKind::Packing => 3,
            ErrorKind::Tessellation => 4,
            ErrorKind::Reconciliation => 5,
            ErrorKind::Io => 6,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Packing => "packing failure",
            ErrorKind::Tessellation => "tessellation failure",
            ErrorKind::Reconciliation => "reconciliation inconsistency",
            ErrorKind::Io => "i/o error",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            exit_code: kind.exit_code(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn packing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Packing, message)
    }

    pub fn tessellation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Tessellation, message)
    }

    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Reconciliation, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.label(), self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_kind() {
        assert_eq!(AppError::configuration("x").exit_code(), 2);
        assert_eq!(AppError::packing("x").exit_code(), 3);
        assert_eq!(AppError::tessellation("x").exit_code(), 4);
        assert_eq!(AppError::reconciliation("x").exit_code(), 5);
        assert_eq!(AppError::io("x").exit_code(), 6);
    }

    #[test]
    fn display_prefixes_kind() {
        let err = AppError::packing("grain 3 could not be placed");
        assert_eq!(err.to_string(), "packing failure: grain 3 could not be placed");
    }
}
