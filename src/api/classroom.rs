use crate::api::pagination::{fetch_all, get_with_retry, RetryPolicy};
use crate::api::transport::Transport;
use crate::error::FetchError;
use crate::models::{Course, CourseMember, CourseWork, StudentSubmission, UserProfile};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;

/// Which courses the authenticated principal wants to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseFilter {
    /// Courses the given student (or `me`) is enrolled in.
    Student(String),
    /// Courses the given teacher (or `me`) teaches.
    Teacher(String),
    /// Every course visible to the caller (domain administrators, coordinators).
    All,
}

/// Read access to Classroom resources plus the two grading pass-through calls.
#[async_trait]
pub trait ClassroomSource: Send + Sync {
    /// Profile of a user, `me` for the authenticated principal.
    async fn get_profile(&self, token: &str, user_id: &str) -> Result<UserProfile, FetchError>;

    async fn list_courses(&self, token: &str, filter: &CourseFilter)
        -> Result<Vec<Course>, FetchError>;

    async fn list_course_work(&self, token: &str, course_id: &str)
        -> Result<Vec<CourseWork>, FetchError>;

    async fn list_students(&self, token: &str, course_id: &str)
        -> Result<Vec<CourseMember>, FetchError>;

    async fn list_teachers(&self, token: &str, course_id: &str)
        -> Result<Vec<CourseMember>, FetchError>;

    /// Submissions for one assignment, restricted to `user_id` when given.
    async fn list_submissions(
        &self,
        token: &str,
        course_id: &str,
        course_work_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<StudentSubmission>, FetchError>;

    async fn patch_grade(
        &self,
        token: &str,
        submission: &StudentSubmission,
        assigned_grade: Option<f64>,
        draft_grade: Option<f64>,
    ) -> Result<StudentSubmission, FetchError>;

    async fn return_submission(
        &self,
        token: &str,
        submission: &StudentSubmission,
    ) -> Result<(), FetchError>;
}

#[derive(Clone)]
pub struct ClassroomClient {
    transport: Arc<dyn Transport>,
    page_size: u32,
    retry: RetryPolicy,
}

impl ClassroomClient {
    pub fn new(transport: Arc<dyn Transport>, page_size: u32, retry: RetryPolicy) -> Self {
        Self {
            transport,
            page_size,
            retry,
        }
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        field: &str,
        query: &[(String, String)],
    ) -> Result<Vec<T>, FetchError> {
        fetch_all(
            self.transport.as_ref(),
            token,
            path,
            field,
            self.page_size,
            query,
            self.retry,
        )
        .await
    }
}

fn submission_path(course_id: &str, course_work_id: &str) -> String {
    format!(
        "/courses/{}/courseWork/{}/studentSubmissions",
        course_id, course_work_id
    )
}

#[async_trait]
impl ClassroomSource for ClassroomClient {
    async fn get_profile(&self, token: &str, user_id: &str) -> Result<UserProfile, FetchError> {
        let path = format!("/userProfiles/{}", user_id);
        let value = get_with_retry(self.transport.as_ref(), token, &path, &[], self.retry).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            path,
            message: e.to_string(),
        })
    }

    async fn list_courses(
        &self,
        token: &str,
        filter: &CourseFilter,
    ) -> Result<Vec<Course>, FetchError> {
        let mut query = vec![("courseStates".to_string(), "ACTIVE".to_string())];
        match filter {
            CourseFilter::Student(id) => query.push(("studentId".to_string(), id.clone())),
            CourseFilter::Teacher(id) => query.push(("teacherId".to_string(), id.clone())),
            CourseFilter::All => {}
        }
        self.list(token, "/courses", "courses", &query).await
    }

    async fn list_course_work(
        &self,
        token: &str,
        course_id: &str,
    ) -> Result<Vec<CourseWork>, FetchError> {
        let path = format!("/courses/{}/courseWork", course_id);
        self.list(token, &path, "courseWork", &[]).await
    }

    async fn list_students(
        &self,
        token: &str,
        course_id: &str,
    ) -> Result<Vec<CourseMember>, FetchError> {
        let path = format!("/courses/{}/students", course_id);
        self.list(token, &path, "students", &[]).await
    }

    async fn list_teachers(
        &self,
        token: &str,
        course_id: &str,
    ) -> Result<Vec<CourseMember>, FetchError> {
        let path = format!("/courses/{}/teachers", course_id);
        self.list(token, &path, "teachers", &[]).await
    }

    async fn list_submissions(
        &self,
        token: &str,
        course_id: &str,
        course_work_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<StudentSubmission>, FetchError> {
        let path = submission_path(course_id, course_work_id);
        let query: Vec<(String, String)> = user_id
            .map(|id| vec![("userId".to_string(), id.to_string())])
            .unwrap_or_default();
        self.list(token, &path, "studentSubmissions", &query).await
    }

    async fn patch_grade(
        &self,
        token: &str,
        submission: &StudentSubmission,
        assigned_grade: Option<f64>,
        draft_grade: Option<f64>,
    ) -> Result<StudentSubmission, FetchError> {
        let path = format!(
            "{}/{}",
            submission_path(&submission.course_id, &submission.course_work_id),
            submission.id
        );

        let mut mask = Vec::new();
        let mut body = serde_json::Map::new();
        if let Some(grade) = assigned_grade {
            mask.push("assignedGrade");
            body.insert("assignedGrade".to_string(), json!(grade));
        }
        if let Some(grade) = draft_grade {
            mask.push("draftGrade");
            body.insert("draftGrade".to_string(), json!(grade));
        }
        if mask.is_empty() {
            return Ok(submission.clone());
        }

        let query = vec![("updateMask".to_string(), mask.join(","))];
        let value = self
            .transport
            .send(token, Method::PATCH, &path, &query, Value::Object(body))
            .await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            path,
            message: e.to_string(),
        })
    }

    async fn return_submission(
        &self,
        token: &str,
        submission: &StudentSubmission,
    ) -> Result<(), FetchError> {
        let path = format!(
            "{}/{}:return",
            submission_path(&submission.course_id, &submission.course_work_id),
            submission.id
        );
        self.transport
            .send(token, Method::POST, &path, &[], json!({}))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pagination::tests::ScriptedTransport;
    use crate::models::SubmissionState;

    fn client(transport: Arc<ScriptedTransport>) -> ClassroomClient {
        ClassroomClient::new(transport, 100, RetryPolicy::none())
    }

    #[tokio::test]
    async fn lists_student_courses_with_filter() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "courses": [{"id": "c1", "name": "Algebra", "section": "A"}]
        }))]));

        let courses = client(transport.clone())
            .list_courses("token", &CourseFilter::Student("me".to_string()))
            .await
            .unwrap();

        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].commission_name(), "A");
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, "/courses");
        assert!(requests[0]
            .1
            .contains(&("studentId".to_string(), "me".to_string())));
    }

    #[tokio::test]
    async fn lists_submissions_for_one_user() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "studentSubmissions": [{
                "id": "s1", "courseId": "c1", "courseWorkId": "w1",
                "userId": "u1", "state": "RETURNED", "assignedGrade": 8
            }]
        }))]));

        let submissions = client(transport.clone())
            .list_submissions("token", "c1", "w1", Some("u1"))
            .await
            .unwrap();

        assert_eq!(submissions[0].state, SubmissionState::Returned);
        assert_eq!(submissions[0].assigned_grade, Some(8.0));
        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].0, "/courses/c1/courseWork/w1/studentSubmissions");
    }

    #[tokio::test]
    async fn fetches_own_profile() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(json!({
            "id": "t1",
            "name": {"fullName": "Grace Hopper"},
            "emailAddress": "grace@example.edu"
        }))]));

        let profile = client(transport.clone()).get_profile("token", "me").await.unwrap();

        assert_eq!(profile.display_name(), "Grace Hopper");
        assert_eq!(profile.email_address.as_deref(), Some("grace@example.edu"));
        assert_eq!(transport.requests.lock().unwrap()[0].0, "/userProfiles/me");
    }

    #[tokio::test]
    async fn patch_without_grades_is_a_no_op() {
        let transport = Arc::new(ScriptedTransport::new(vec![]));
        let submission: StudentSubmission = serde_json::from_value(json!({
            "id": "s1", "courseId": "c1", "courseWorkId": "w1", "userId": "u1"
        }))
        .unwrap();

        let result = client(transport.clone())
            .patch_grade("token", &submission, None, None)
            .await
            .unwrap();

        assert_eq!(result, submission);
        assert_eq!(transport.request_count(), 0);
    }
}
