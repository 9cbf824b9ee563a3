use crate::error::{AuthError, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Coordinator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Coordinator => "coordinator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "coordinator" => Ok(Role::Coordinator),
            other => Err(format!(
                "unknown role '{}', expected student, teacher or coordinator",
                other
            )),
        }
    }
}

/// Active role and access token for one data load.
///
/// Passed explicitly to every assembler; the token is read-only for the
/// duration of a call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    access_token: Option<String>,
    role: Option<Role>,
}

impl SessionContext {
    pub fn new(access_token: impl Into<String>, role: Role) -> Self {
        let mut session = Self::default();
        session.init(access_token, role);
        session
    }

    pub fn init(&mut self, access_token: impl Into<String>, role: Role) {
        self.access_token = Some(access_token.into());
        self.role = Some(role);
    }

    pub fn clear(&mut self) {
        self.access_token = None;
        self.role = None;
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = Some(role);
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token
            .as_deref()
            .map(|t| !t.is_empty())
            .unwrap_or(false)
    }

    pub fn token(&self) -> Result<&str, AuthError> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }
}

/// Persists the session's two scalars as a small JSON file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty session.
    pub fn load(&self) -> Result<SessionContext, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionContext::default())
            }
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&raw).map_err(|e| StoreError::Parse {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn save(&self, session: &SessionContext) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(session).map_err(|e| StoreError::Parse {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, raw).map_err(|e| self.io_error(e))
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "classroom_dashboard_{}_{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn init_and_clear_lifecycle() {
        let mut session = SessionContext::default();
        assert!(!session.is_authenticated());
        assert!(matches!(session.token(), Err(AuthError::MissingToken)));

        session.init("ya29.token", Role::Teacher);
        assert!(session.is_authenticated());
        assert_eq!(session.token().unwrap(), "ya29.token");
        assert_eq!(session.role(), Some(Role::Teacher));

        session.clear();
        assert!(!session.is_authenticated());
        assert_eq!(session.role(), None);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Coordinator".parse::<Role>().unwrap(), Role::Coordinator);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn store_round_trips_and_clears() {
        let store = SessionStore::new(temp_path("session"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), SessionContext::default());

        let session = SessionContext::new("abc", Role::Student);
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), session);

        store.clear().unwrap();
        assert!(!store.path().exists());
    }
}
