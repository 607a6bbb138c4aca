use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeamsError};

/// Status of a student's sign-up for an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    #[default]
    Registered,
    Verified,
    Rejected,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Registered => "registered",
            RegistrationStatus::Verified => "verified",
            RegistrationStatus::Rejected => "rejected",
        }
    }

    /// Attendance can only be recorded once, and never for a rejected sign-up.
    pub fn ensure_verifiable(&self) -> Result<()> {
        match self {
            RegistrationStatus::Registered => Ok(()),
            RegistrationStatus::Verified => Err(SeamsError::AlreadyVerified),
            RegistrationStatus::Rejected => Err(SeamsError::RegistrationRejected),
        }
    }

    /// Only pending sign-ups can be rejected; credits already posted stay posted.
    pub fn ensure_rejectable(&self) -> Result<()> {
        self.ensure_verifiable()
    }

    /// Whether the registration occupies a seat.
    pub fn holds_seat(&self) -> bool {
        !matches!(self, RegistrationStatus::Rejected)
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = SeamsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "registered" => Ok(RegistrationStatus::Registered),
            "verified" => Ok(RegistrationStatus::Verified),
            "rejected" => Ok(RegistrationStatus::Rejected),
            other => Err(SeamsError::InvalidInput(format!(
                "unknown registration status '{}'",
                other
            ))),
        }
    }
}

impl TryFrom<String> for RegistrationStatus {
    type Error = SeamsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifiable_states() {
        assert!(RegistrationStatus::Registered.ensure_verifiable().is_ok());
        assert_eq!(
            RegistrationStatus::Verified.ensure_verifiable(),
            Err(SeamsError::AlreadyVerified)
        );
        assert_eq!(
            RegistrationStatus::Rejected.ensure_verifiable(),
            Err(SeamsError::RegistrationRejected)
        );
    }

    #[test]
    fn test_rejectable_states() {
        assert!(RegistrationStatus::Registered.ensure_rejectable().is_ok());
        assert!(RegistrationStatus::Verified.ensure_rejectable().is_err());
        assert!(RegistrationStatus::Rejected.ensure_rejectable().is_err());
    }

    #[test]
    fn test_seat_holding() {
        assert!(RegistrationStatus::Registered.holds_seat());
        assert!(RegistrationStatus::Verified.holds_seat());
        assert!(!RegistrationStatus::Rejected.holds_seat());
    }
}
