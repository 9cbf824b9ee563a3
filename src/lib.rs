//! Role-based progress dashboards over the Google Classroom API.
//!
//! Data flows from the session's token through the paginated fetcher and the
//! course joiner into the progress aggregator and status classifier, and from
//! there into one of the three role assemblers in [`dashboard`].

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod joiner;
pub mod models;
pub mod progress;
pub mod session;
pub mod status;
pub mod store;

pub use config::Config;
pub use dashboard::{AssemblyResult, Dashboard, DashboardView, Policy, Sources};
pub use error::{AuthError, DashboardError, FetchError, StoreError};
pub use session::{Role, SessionContext, SessionStore};
pub use store::{AssignmentStore, MemoryAssignmentStore, TeacherStudentLink, YamlAssignmentStore};
