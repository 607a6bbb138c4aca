use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeamsError};

/// Account role. Determines which operations a user may perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Coordinator,
    Faculty,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Coordinator, Role::Faculty, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Coordinator => "coordinator",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
        }
    }

    /// Coordinators, faculty and admins may create and run events.
    pub fn can_manage_events(&self) -> bool {
        matches!(self, Role::Coordinator | Role::Faculty | Role::Admin)
    }

    /// Events created by faculty and admins skip the approval queue.
    pub fn auto_approves_events(&self) -> bool {
        matches!(self, Role::Faculty | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SeamsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "coordinator" => Ok(Role::Coordinator),
            "faculty" => Ok(Role::Faculty),
            "admin" => Ok(Role::Admin),
            other => Err(SeamsError::InvalidInput(format!("unknown role '{}'", other))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = SeamsError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}
