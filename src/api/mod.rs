pub mod classroom;
pub mod oauth;
pub mod pagination;
pub mod transport;

pub use classroom::{ClassroomClient, ClassroomSource, CourseFilter};
pub use oauth::OAuthClient;
pub use pagination::{fetch_all, RetryPolicy};
pub use transport::{HttpTransport, Transport};
