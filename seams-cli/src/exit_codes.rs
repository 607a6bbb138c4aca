//! Exit codes following sysexits.h conventions.

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Token malformed, tampered or expired.
/// Maps to EX_DATAERR from sysexits.h.
pub const TOKEN_INVALID: i32 = 65;

/// Database unreachable.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const DATABASE_UNAVAILABLE: i32 = 69;

/// Marks an error with the exit code it should produce.
#[derive(Debug)]
pub struct Classified {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for Classified {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Classified {}

/// Build an error that exits with `code`.
pub fn classified(code: i32, message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(Classified {
        code,
        message: message.into(),
    })
}

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // An explicit classification anywhere in the chain wins
        let code = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<Classified>().map(|c| c.code))
            .unwrap_or_else(|| {
                if message.contains("Database connection error") {
                    DATABASE_UNAVAILABLE
                } else {
                    GENERAL_ERROR
                }
            });

        Self {
            code,
            message: Some(message),
        }
    }
}
