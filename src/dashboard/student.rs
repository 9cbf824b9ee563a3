use crate::api::{ClassroomSource, CourseFilter};
use crate::dashboard::{Assembler, Policy, Sources};
use crate::error::DashboardError;
use crate::joiner::{fetch_course_data, ME};
use crate::models::{AssignmentStatus, Course, CourseData, StudentProgress};
use crate::progress::{compute_progress, merge_progress};
use crate::status::{classify, is_outstanding};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;

/// Courses loaded at once.
const COURSE_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDeadline {
    pub course_id: String,
    pub course_name: String,
    pub assignment_id: String,
    pub title: String,
    pub due_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_courses: usize,
    pub total_assignments: usize,
    pub pending_count: usize,
    pub overdue_count: usize,
    pub submitted_count: usize,
    pub average_grade: f64,
    pub completion_percentage: f64,
    pub upcoming_deadlines: Vec<UpcomingDeadline>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub course_id: String,
    pub course_name: String,
    pub section: Option<String>,
    pub link: Option<String>,
    pub progress: StudentProgress,
}

/// One row of the "all assignments" view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    pub course_id: String,
    pub course_name: String,
    pub assignment_id: String,
    pub title: String,
    pub due_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub max_points: Option<f64>,
    pub status: AssignmentStatus,
    pub assigned_grade: Option<f64>,
    pub late: bool,
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentDashboard {
    pub student: StudentIdentity,
    pub summary: DashboardSummary,
    pub overall: StudentProgress,
    pub courses: Vec<CourseProgress>,
    pub all_assignments: Vec<AssignmentRow>,
    /// Courses left out because their data could not be loaded.
    pub skipped_courses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StudentAssembler {
    policy: Policy,
}

impl StudentAssembler {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }
}

/// Load every course's joined data, skipping courses that fail for any reason
/// other than authorization.
pub(crate) async fn load_courses(
    classroom: &dyn ClassroomSource,
    token: &str,
    courses: Vec<Course>,
    student_id: &str,
) -> Result<(Vec<(Course, CourseData)>, Vec<String>), DashboardError> {
    let results: Vec<_> = stream::iter(courses)
        .map(|course| async move {
            let data = fetch_course_data(classroom, token, &course.id, student_id).await;
            (course, data)
        })
        .buffered(COURSE_CONCURRENCY)
        .collect()
        .await;

    let mut loaded = Vec::new();
    let mut skipped = Vec::new();
    for (course, data) in results {
        match data {
            Ok(data) => loaded.push((course, data)),
            Err(e) if e.is_unauthorized() => return Err(DashboardError::from_fetch(e)),
            Err(e) => {
                tracing::warn!(course_id = %course.id, error = %e, "skipping course");
                skipped.push(course.id);
            }
        }
    }
    Ok((loaded, skipped))
}

pub fn assignment_rows(course: &Course, data: &CourseData, now: DateTime<Utc>) -> Vec<AssignmentRow> {
    data.joined
        .iter()
        .map(|joined| {
            let work = &joined.assignment;
            let submission = joined.submission.as_ref();
            AssignmentRow {
                course_id: course.id.clone(),
                course_name: course.name.clone(),
                assignment_id: work.id.clone(),
                title: work.title.clone(),
                due_at: work.due_at(),
                created_at: work.creation_time,
                max_points: work.max_points,
                status: classify(work, submission, now),
                assigned_grade: submission.and_then(|s| s.assigned_grade),
                late: submission.map(|s| s.late).unwrap_or(false),
                link: work.alternate_link.clone(),
            }
        })
        .collect()
}

/// Outstanding work with a future due date, soonest first.
pub fn upcoming_deadlines(
    rows: &[AssignmentRow],
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<UpcomingDeadline> {
    let mut upcoming: Vec<(&AssignmentRow, DateTime<Utc>)> = rows
        .iter()
        .filter(|r| is_outstanding(r.status))
        .filter_map(|r| r.due_at.filter(|due| *due > now).map(|due| (r, due)))
        .collect();
    upcoming.sort_by(|(a, a_due), (b, b_due)| {
        a_due
            .cmp(b_due)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.assignment_id.cmp(&b.assignment_id))
    });

    upcoming
        .into_iter()
        .take(limit)
        .map(|(row, due_at)| UpcomingDeadline {
            course_id: row.course_id.clone(),
            course_name: row.course_name.clone(),
            assignment_id: row.assignment_id.clone(),
            title: row.title.clone(),
            due_at,
        })
        .collect()
}

#[async_trait]
impl Assembler for StudentAssembler {
    type Output = StudentDashboard;

    async fn assemble(
        &self,
        token: &str,
        sources: Sources<'_>,
        now: DateTime<Utc>,
    ) -> Result<StudentDashboard, DashboardError> {
        let classroom = sources.classroom;
        let profile = classroom
            .get_profile(token, ME)
            .await
            .map_err(DashboardError::from_fetch)?;
        let courses = classroom
            .list_courses(token, &CourseFilter::Student(ME.to_string()))
            .await
            .map_err(DashboardError::from_fetch)?;
        tracing::debug!(student_id = %profile.id, courses = courses.len(), "loaded student courses");

        let (loaded, skipped_courses) = load_courses(classroom, token, courses, ME).await?;

        let mut course_progress = Vec::with_capacity(loaded.len());
        let mut all_assignments = Vec::new();
        for (course, data) in &loaded {
            let progress =
                compute_progress(&profile.id, Some(course.id.as_str()), &data.assignments, &data.submissions);
            all_assignments.extend(assignment_rows(course, data, now));
            course_progress.push(CourseProgress {
                course_id: course.id.clone(),
                course_name: course.name.clone(),
                section: course.section.clone(),
                link: course.alternate_link.clone(),
                progress,
            });
        }

        let parts: Vec<StudentProgress> = course_progress.iter().map(|c| c.progress.clone()).collect();
        let overall = merge_progress(&profile.id, &parts);

        let summary = DashboardSummary {
            total_courses: course_progress.len(),
            total_assignments: overall.total_assignments,
            pending_count: all_assignments
                .iter()
                .filter(|r| r.status == AssignmentStatus::Pending)
                .count(),
            overdue_count: all_assignments
                .iter()
                .filter(|r| r.status == AssignmentStatus::Late)
                .count(),
            submitted_count: overall.submitted_count,
            average_grade: overall.average_grade,
            completion_percentage: overall.completion_percentage,
            upcoming_deadlines: upcoming_deadlines(&all_assignments, now, self.policy.upcoming_limit),
        };

        Ok(StudentDashboard {
            student: StudentIdentity {
                id: profile.id.clone(),
                name: profile.display_name(),
                email: profile.email_address.clone(),
            },
            summary,
            overall,
            courses: course_progress,
            all_assignments,
            skipped_courses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joiner::tests::{course, FakeClassroom};
    use crate::models::{Date, Name, SubmissionState, UserProfile};
    use crate::progress::tests::{sub, work};
    use crate::store::MemoryAssignmentStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap()
    }

    fn due(mut w: crate::models::CourseWork, year: i32, month: u32, day: u32) -> crate::models::CourseWork {
        w.due_date = Some(Date { year, month, day });
        w
    }

    fn classroom() -> FakeClassroom {
        let mut fake = FakeClassroom {
            profile: UserProfile {
                id: "x".to_string(),
                name: Name {
                    full_name: Some("Xavier".to_string()),
                    ..Default::default()
                },
                email_address: Some("x@example.edu".to_string()),
                photo_url: None,
            },
            courses: vec![course("C", "Chemistry", Some("3B")), course("D", "Drama", None)],
            ..Default::default()
        };
        fake.course_work.insert(
            "C".to_string(),
            vec![
                work("w1", "C", "Essay"),
                work("w2", "C", "Quiz"),
                due(work("w3", "C", "Lab"), 2025, 4, 1),
                due(work("w4", "C", "Project"), 2025, 5, 1),
            ],
        );
        fake.course_work.insert(
            "D".to_string(),
            vec![due(work("d1", "D", "Monologue"), 2025, 4, 20)],
        );
        fake.submissions = vec![
            sub("s1", "C", "w1", SubmissionState::Returned, Some(90.0), false),
            sub("s2", "C", "w2", SubmissionState::TurnedIn, None, false),
            sub("s3", "C", "w3", SubmissionState::Created, None, true),
            sub("s4", "C", "w4", SubmissionState::Created, None, false),
        ];
        fake
    }

    async fn assemble(fake: &FakeClassroom) -> StudentDashboard {
        let store = MemoryAssignmentStore::default();
        let sources = Sources {
            classroom: fake,
            store: &store,
        };
        StudentAssembler::new(Policy::default())
            .assemble("token", sources, now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn builds_course_progress_and_summary() {
        let dashboard = assemble(&classroom()).await;

        let chem = &dashboard.courses[0].progress;
        assert_eq!(chem.total_assignments, 4);
        assert_eq!(chem.submitted_count, 2);
        assert_eq!(chem.graded_count, 1);
        assert_eq!(chem.late_count, 1);
        assert_eq!(chem.completion_percentage, 50.0);
        assert_eq!(chem.average_grade, 90.0);

        assert_eq!(dashboard.summary.total_courses, 2);
        assert_eq!(dashboard.summary.total_assignments, 5);
        assert_eq!(dashboard.summary.overdue_count, 1);
        // w4 (created, not late) and d1 (no submission, not yet due)
        assert_eq!(dashboard.summary.pending_count, 2);
        assert_eq!(dashboard.summary.completion_percentage, 40.0);
        assert_eq!(dashboard.all_assignments.len(), 5);
        assert_eq!(dashboard.student.name, "Xavier");
    }

    #[tokio::test]
    async fn upcoming_deadlines_are_sorted_and_future_only() {
        let dashboard = assemble(&classroom()).await;
        let titles: Vec<&str> = dashboard
            .summary
            .upcoming_deadlines
            .iter()
            .map(|d| d.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Monologue", "Project"]);
    }

    #[tokio::test]
    async fn broken_course_does_not_blank_the_dashboard() {
        let mut fake = classroom();
        fake.failing_courses.insert("D".to_string());

        let dashboard = assemble(&fake).await;

        assert_eq!(dashboard.courses.len(), 1);
        assert_eq!(dashboard.skipped_courses, vec!["D".to_string()]);
        assert_eq!(dashboard.summary.total_assignments, 4);
    }

    #[tokio::test]
    async fn student_without_courses_gets_zeroes() {
        let fake = FakeClassroom::default();
        let dashboard = assemble(&fake).await;
        assert_eq!(dashboard.summary.total_courses, 0);
        assert_eq!(dashboard.summary.completion_percentage, 0.0);
        assert_eq!(dashboard.summary.average_grade, 0.0);
    }
}
