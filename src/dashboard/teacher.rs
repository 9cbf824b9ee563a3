use crate::api::{ClassroomSource, CourseFilter};
use crate::dashboard::commission::{group_by_commission, Commission};
use crate::dashboard::policy::sort_alerts;
use crate::dashboard::{Assembler, Policy, Sources};
use crate::error::DashboardError;
use crate::joiner::{fetch_course_data, ME};
use crate::models::{Alert, Course, ProgressSummary, StudentAssignment, StudentStatus, UserProfile};
use crate::progress::{compute_progress, mean, round2};
use crate::store::TeacherStudentLink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Students loaded at once.
const STUDENT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherIdentity {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherSummary {
    pub total_students: usize,
    pub total_commissions: usize,
    pub students_at_risk: usize,
    pub average_progress: f64,
    pub alert_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherDashboard {
    pub teacher: TeacherIdentity,
    pub summary: TeacherSummary,
    pub students: Vec<StudentAssignment>,
    pub commissions: Vec<Commission>,
    pub alerts: Vec<Alert>,
    /// Assigned students whose progress could not be loaded.
    pub skipped_students: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TeacherAssembler {
    policy: Policy,
}

impl TeacherAssembler {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }
}

type Rosters = HashMap<(String, String), UserProfile>;

/// Student profiles of the given courses keyed by (course, student).
async fn load_rosters(
    classroom: &dyn ClassroomSource,
    token: &str,
    course_ids: &BTreeSet<String>,
) -> Result<Rosters, DashboardError> {
    let mut rosters = HashMap::new();
    for course_id in course_ids {
        match classroom.list_students(token, course_id).await {
            Ok(members) => {
                for member in members {
                    rosters.insert((course_id.clone(), member.user_id), member.profile);
                }
            }
            Err(e) if e.is_unauthorized() => return Err(DashboardError::from_fetch(e)),
            Err(e) => tracing::warn!(course_id = %course_id, error = %e, "roster unavailable"),
        }
    }
    Ok(rosters)
}

fn commission_for(link: &TeacherStudentLink, course: Option<&Course>) -> String {
    if !link.commission.trim().is_empty() {
        return link.commission.clone();
    }
    course
        .map(|c| c.commission_name().to_string())
        .unwrap_or_else(|| link.course_id.clone())
}

pub fn summarize(students: &[StudentAssignment], commissions: &[Commission], alerts: &[Alert]) -> TeacherSummary {
    TeacherSummary {
        total_students: students.len(),
        total_commissions: commissions.len(),
        students_at_risk: students
            .iter()
            .filter(|s| s.status == StudentStatus::AtRisk)
            .count(),
        average_progress: round2(mean(
            students.iter().map(|s| s.progress.completion_percentage),
        )),
        alert_count: alerts.len(),
    }
}

#[async_trait]
impl Assembler for TeacherAssembler {
    type Output = TeacherDashboard;

    async fn assemble(
        &self,
        token: &str,
        sources: Sources<'_>,
        _now: DateTime<Utc>,
    ) -> Result<TeacherDashboard, DashboardError> {
        let classroom = sources.classroom;
        let profile = classroom
            .get_profile(token, ME)
            .await
            .map_err(DashboardError::from_fetch)?;
        let links = sources.store.links_for_teacher(&profile.id).await?;
        let courses: HashMap<String, Course> = classroom
            .list_courses(token, &CourseFilter::Teacher(ME.to_string()))
            .await
            .map_err(DashboardError::from_fetch)?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        tracing::debug!(teacher_id = %profile.id, links = links.len(), "loaded teacher assignments");

        let course_ids: BTreeSet<String> = links.iter().map(|l| l.course_id.clone()).collect();
        let rosters = load_rosters(classroom, token, &course_ids).await?;

        let results: Vec<_> = stream::iter(links)
            .map(|link| async move {
                let data =
                    fetch_course_data(classroom, token, &link.course_id, &link.student_id).await;
                (link, data)
            })
            .buffered(STUDENT_CONCURRENCY)
            .collect()
            .await;

        let mut students = Vec::with_capacity(results.len());
        let mut skipped_students = Vec::new();
        for (link, data) in results {
            let data = match data {
                Ok(data) => data,
                Err(e) if e.is_unauthorized() => return Err(DashboardError::from_fetch(e)),
                Err(e) => {
                    tracing::warn!(
                        student_id = %link.student_id,
                        course_id = %link.course_id,
                        error = %e,
                        "skipping student"
                    );
                    skipped_students.push(link.student_id.clone());
                    continue;
                }
            };

            let progress = compute_progress(
                &link.student_id,
                Some(link.course_id.as_str()),
                &data.assignments,
                &data.submissions,
            );
            let summary = ProgressSummary::from(&progress);
            let course = courses.get(&link.course_id);
            let roster = rosters.get(&(link.course_id.clone(), link.student_id.clone()));

            students.push(StudentAssignment {
                student_id: link.student_id.clone(),
                student_name: roster
                    .map(UserProfile::display_name)
                    .unwrap_or_else(|| link.student_id.clone()),
                email: roster.and_then(|p| p.email_address.clone()),
                course_id: link.course_id.clone(),
                course_name: course
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| link.course_id.clone()),
                commission: commission_for(&link, course),
                status: self.policy.student_status(&summary),
                progress: summary,
            });
        }

        students.sort_by(|a, b| {
            (&a.commission, &a.student_name, &a.student_id)
                .cmp(&(&b.commission, &b.student_name, &b.student_id))
        });
        skipped_students.sort();
        skipped_students.dedup();

        let commissions = group_by_commission(&students);
        let mut alerts: Vec<Alert> = students
            .iter()
            .flat_map(|s| self.policy.alerts_for(s))
            .collect();
        sort_alerts(&mut alerts);

        Ok(TeacherDashboard {
            teacher: TeacherIdentity {
                id: profile.id.clone(),
                name: profile.display_name(),
                email: profile.email_address.clone(),
            },
            summary: summarize(&students, &commissions, &alerts),
            students,
            commissions,
            alerts,
            skipped_students,
        })
    }
}
