//! Role data assemblers.
//!
//! Each role has one assembler producing its view model. The role is resolved
//! once, when a [`Dashboard`] is built from the session, and every call
//! returns an [`AssemblyResult`] instead of an error so callers can render a
//! retry action uniformly.

pub mod commission;
pub mod coordinator;
pub mod policy;
pub mod recommend;
pub mod student;
pub mod teacher;

use crate::api::ClassroomSource;
use crate::error::{AuthError, DashboardError};
use crate::session::{Role, SessionContext};
use crate::store::AssignmentStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use commission::Commission;
pub use coordinator::{CoordinatorAssembler, CoordinatorDashboard};
pub use policy::Policy;
pub use student::{StudentAssembler, StudentDashboard};
pub use teacher::{TeacherAssembler, TeacherDashboard};

/// Uniform outcome of an assembler call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> AssemblyResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: Result<T, DashboardError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                tracing::error!(error = %e, "dashboard assembly failed");
                Self::failure(e.to_string())
            }
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AssemblyResult<U> {
        AssemblyResult {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
        }
    }
}

/// External collaborators an assembler reads from.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub classroom: &'a dyn ClassroomSource,
    pub store: &'a dyn AssignmentStore,
}

#[async_trait]
pub trait Assembler: Send + Sync {
    type Output: Serialize + Send;

    async fn assemble(
        &self,
        token: &str,
        sources: Sources<'_>,
        now: DateTime<Utc>,
    ) -> Result<Self::Output, DashboardError>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "role", content = "dashboard", rename_all = "lowercase")]
pub enum DashboardView {
    Student(StudentDashboard),
    Teacher(TeacherDashboard),
    Coordinator(CoordinatorDashboard),
}

#[derive(Debug, Clone)]
pub enum Dashboard {
    Student(StudentAssembler),
    Teacher(TeacherAssembler),
    Coordinator(CoordinatorAssembler),
}

impl Dashboard {
    pub fn for_role(role: Role, policy: Policy) -> Self {
        match role {
            Role::Student => Dashboard::Student(StudentAssembler::new(policy)),
            Role::Teacher => Dashboard::Teacher(TeacherAssembler::new(policy)),
            Role::Coordinator => Dashboard::Coordinator(CoordinatorAssembler::new(policy)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Dashboard::Student(_) => Role::Student,
            Dashboard::Teacher(_) => Role::Teacher,
            Dashboard::Coordinator(_) => Role::Coordinator,
        }
    }

    /// Load the dashboard for the session. The token is read once and used
    /// unchanged for every request of this call.
    pub async fn load(
        &self,
        session: &SessionContext,
        sources: Sources<'_>,
        now: DateTime<Utc>,
    ) -> AssemblyResult<DashboardView> {
        let token = match session.token() {
            Ok(token) => token,
            Err(e) => return AssemblyResult::failure(e.to_string()),
        };
        if let Some(role) = session.role() {
            if role != self.role() {
                return AssemblyResult::failure(format!(
                    "session role is {} but the {} dashboard was requested",
                    role,
                    self.role()
                ));
            }
        }

        tracing::info!(role = %self.role(), "loading dashboard");
        let result = match self {
            Dashboard::Student(a) => a
                .assemble(token, sources, now)
                .await
                .map(DashboardView::Student),
            Dashboard::Teacher(a) => a
                .assemble(token, sources, now)
                .await
                .map(DashboardView::Teacher),
            Dashboard::Coordinator(a) => a
                .assemble(token, sources, now)
                .await
                .map(DashboardView::Coordinator),
        };
        AssemblyResult::from_result(result)
    }
}

/// Resolve the dashboard for the session's role.
pub fn dashboard_for(session: &SessionContext, policy: Policy) -> Result<Dashboard, AuthError> {
    session.token()?;
    let role = session.role().ok_or(AuthError::MissingToken)?;
    Ok(Dashboard::for_role(role, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::joiner::tests::FakeClassroom;
    use crate::store::MemoryAssignmentStore;

    #[test]
    fn result_serializes_without_absent_fields() {
        let ok = serde_json::to_value(AssemblyResult::ok(3)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "data": 3}));

        let err: AssemblyResult<u8> = AssemblyResult::from_result(Err(DashboardError::Fetch(
            FetchError::Timeout {
                path: "/courses".to_string(),
            },
        )));
        let err = serde_json::to_value(err).unwrap();
        assert_eq!(err["success"], false);
        assert!(err["error"].as_str().unwrap().contains("timed out"));
        assert!(err.get("data").is_none());
    }

    #[tokio::test]
    async fn missing_token_is_a_failed_result() {
        let fake = FakeClassroom::default();
        let store = MemoryAssignmentStore::default();
        let sources = Sources {
            classroom: &fake,
            store: &store,
        };

        let result = Dashboard::for_role(Role::Student, Policy::default())
            .load(&SessionContext::default(), sources, Utc::now())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("log in"));
    }

    #[tokio::test]
    async fn role_mismatch_is_rejected() {
        let fake = FakeClassroom::default();
        let store = MemoryAssignmentStore::default();
        let sources = Sources {
            classroom: &fake,
            store: &store,
        };
        let session = SessionContext::new("token", Role::Student);

        let result = Dashboard::for_role(Role::Coordinator, Policy::default())
            .load(&session, sources, Utc::now())
            .await;

        assert!(!result.success);
    }

    #[tokio::test]
    async fn expired_token_fails_the_whole_load() {
        let fake = FakeClassroom {
            unauthorized: true,
            ..Default::default()
        };
        let store = MemoryAssignmentStore::default();
        let sources = Sources {
            classroom: &fake,
            store: &store,
        };
        let session = SessionContext::new("expired", Role::Teacher);

        let dashboard = dashboard_for(&session, Policy::default()).unwrap();
        let result = dashboard.load(&session, sources, Utc::now()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("log in again"));
    }
}
