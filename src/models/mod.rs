use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Google Classroom API Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseState {
    CourseStateUnspecified,
    Active,
    Archived,
    Provisioned,
    Declined,
    Suspended,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub section: Option<String>,
    #[serde(default)]
    pub owner_id: String,
    pub course_state: Option<CourseState>,
    pub alternate_link: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
}

impl Course {
    /// Commission (class-section) label: the section when present, otherwise the course name.
    pub fn commission_name(&self) -> &str {
        self.section
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseWorkState {
    CourseWorkStateUnspecified,
    Published,
    Draft,
    Deleted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Google omits zero-valued fields, so every component defaults to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeOfDay {
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub seconds: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseWork {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<Date>,
    pub due_time: Option<TimeOfDay>,
    pub max_points: Option<f64>,
    pub state: Option<CourseWorkState>,
    pub alternate_link: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
}

impl CourseWork {
    /// Due instant in UTC. A due date without a time means midnight UTC.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let date = self.due_date?;
        let day = NaiveDate::from_ymd_opt(date.year, date.month, date.day)?;
        let time = self.due_time.unwrap_or_default();
        let time = NaiveTime::from_hms_opt(time.hours, time.minutes, time.seconds)?;
        Some(day.and_time(time).and_utc())
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at().map(|due| now > due).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    SubmissionStateUnspecified,
    New,
    Created,
    TurnedIn,
    Returned,
    ReclaimedByStudent,
    #[serde(other)]
    Unknown,
}

impl SubmissionState {
    pub fn is_submitted(self) -> bool {
        matches!(self, SubmissionState::TurnedIn | SubmissionState::Returned)
    }
}

impl Default for SubmissionState {
    fn default() -> Self {
        SubmissionState::SubmissionStateUnspecified
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSubmission {
    pub id: String,
    pub course_id: String,
    pub course_work_id: String,
    pub user_id: String,
    #[serde(default)]
    pub state: SubmissionState,
    #[serde(default)]
    pub late: bool,
    pub assigned_grade: Option<f64>,
    pub draft_grade: Option<f64>,
    pub alternate_link: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Name {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Name,
    pub email_address: Option<String>,
    pub photo_url: Option<String>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        if let Some(full) = self.name.full_name.as_deref().filter(|n| !n.is_empty()) {
            return full.to_string();
        }
        let parts: Vec<&str> = [&self.name.given_name, &self.name.family_name]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            self.id.clone()
        } else {
            parts.join(" ")
        }
    }
}

/// Roster entry from `courses/{id}/students` or `courses/{id}/teachers`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMember {
    pub course_id: String,
    pub user_id: String,
    #[serde(default)]
    pub profile: UserProfile,
}

// ============================================================================
// OAuth Models
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: String,
    pub scope: Option<String>,
}

// ============================================================================
// Derived Models
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedSubmission {
    #[serde(flatten)]
    pub submission: StudentSubmission,
    pub assignment_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub course_id: Option<String>,
    pub student_id: String,
    pub total_assignments: usize,
    pub submitted_count: usize,
    pub graded_count: usize,
    pub late_count: usize,
    pub average_grade: f64,
    pub completion_percentage: f64,
    pub submissions: Vec<AnnotatedSubmission>,
}

/// StudentProgress without the submission list, for roster views.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_assignments: usize,
    pub submitted_count: usize,
    pub graded_count: usize,
    pub late_count: usize,
    pub average_grade: f64,
    pub completion_percentage: f64,
}

impl From<&StudentProgress> for ProgressSummary {
    fn from(progress: &StudentProgress) -> Self {
        Self {
            total_assignments: progress.total_assignments,
            submitted_count: progress.submitted_count,
            graded_count: progress.graded_count,
            late_count: progress.late_count,
            average_grade: progress.average_grade,
            completion_percentage: progress.completion_percentage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Submitted,
    Graded,
    Returned,
    Late,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::Submitted => "submitted",
            AssignmentStatus::Graded => "graded",
            AssignmentStatus::Returned => "returned",
            AssignmentStatus::Late => "late",
        }
    }
}

/// One assignment of a course joined with the student's submission, if any.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedAssignment {
    pub assignment: CourseWork,
    pub submission: Option<StudentSubmission>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseData {
    pub course_id: String,
    pub student_id: String,
    pub assignments: Vec<CourseWork>,
    pub submissions: Vec<StudentSubmission>,
    pub joined: Vec<JoinedAssignment>,
    /// Assignments whose submissions could not be fetched.
    pub skipped_assignments: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    AtRisk,
    Behind,
    Excellent,
}

/// A student bound to a commission, as a teacher or coordinator sees them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignment {
    pub student_id: String,
    pub student_name: String,
    /// From the roster profile; absent when the caller cannot see emails.
    pub email: Option<String>,
    pub course_id: String,
    pub course_name: String,
    pub commission: String,
    pub status: StudentStatus,
    pub progress: ProgressSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LateSubmissions,
    LowCompletion,
    LowGrade,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LateSubmissions => "late_submissions",
            AlertKind::LowCompletion => "low_completion",
            AlertKind::LowGrade => "low_grade",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub course_name: Option<String>,
    pub action_required: bool,
}
