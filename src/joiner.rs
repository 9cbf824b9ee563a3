use crate::api::ClassroomSource;
use crate::error::FetchError;
use crate::models::{CourseData, CourseWork, JoinedAssignment, StudentSubmission};
use futures_util::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};

/// Per-assignment submission requests in flight at once.
pub const SUBMISSION_CONCURRENCY: usize = 8;

/// The Classroom alias for the authenticated user.
pub const ME: &str = "me";

/// Fetch a course's assignments and one student's submissions, and join them.
///
/// Submission fetches fan out per assignment. A failed fetch is logged and that
/// assignment is joined without a submission, except for authorization
/// failures, which abort the whole call. Output is sorted by assignment
/// creation time, then identifier.
pub async fn fetch_course_data(
    source: &dyn ClassroomSource,
    token: &str,
    course_id: &str,
    student_id: &str,
) -> Result<CourseData, FetchError> {
    let mut assignments = source.list_course_work(token, course_id).await?;
    sort_assignments(&mut assignments);

    let results: Vec<(String, Result<Vec<StudentSubmission>, FetchError>)> =
        stream::iter(assignments.iter().map(|a| a.id.clone()).collect::<Vec<_>>())
            .map(|assignment_id| async move {
                let result = source
                    .list_submissions(token, course_id, &assignment_id, Some(student_id))
                    .await;
                (assignment_id, result)
            })
            .buffer_unordered(SUBMISSION_CONCURRENCY)
            .collect()
            .await;

    // Keyed by submission id so overlapping responses cannot double count.
    let mut unique: BTreeMap<String, StudentSubmission> = BTreeMap::new();
    let mut skipped_assignments = Vec::new();

    for (assignment_id, result) in results {
        match result {
            Ok(submissions) => {
                for submission in submissions {
                    if student_id == ME || submission.user_id == student_id {
                        unique.entry(submission.id.clone()).or_insert(submission);
                    }
                }
            }
            Err(e) if e.is_unauthorized() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    course_id,
                    assignment_id = %assignment_id,
                    error = %e,
                    "skipping submissions for assignment"
                );
                skipped_assignments.push(assignment_id);
            }
        }
    }
    skipped_assignments.sort();

    let submissions: Vec<StudentSubmission> = unique.into_values().collect();
    let joined = join(&assignments, &submissions);
    let submissions = joined
        .iter()
        .filter_map(|j| j.submission.clone())
        .collect();

    tracing::debug!(
        course_id,
        student_id,
        assignments = assignments.len(),
        skipped = skipped_assignments.len(),
        "joined course data"
    );

    Ok(CourseData {
        course_id: course_id.to_string(),
        student_id: student_id.to_string(),
        assignments,
        submissions,
        joined,
        skipped_assignments,
    })
}

pub fn sort_assignments(assignments: &mut [CourseWork]) {
    assignments.sort_by(|a, b| {
        a.creation_time
            .cmp(&b.creation_time)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Pair each assignment with the submission sharing its identifier. When more
/// than one submission matches, the one with the smallest identifier wins.
pub fn join(assignments: &[CourseWork], submissions: &[StudentSubmission]) -> Vec<JoinedAssignment> {
    let mut by_assignment: HashMap<&str, &StudentSubmission> = HashMap::new();
    for submission in submissions {
        by_assignment
            .entry(submission.course_work_id.as_str())
            .and_modify(|current| {
                if submission.id < current.id {
                    *current = submission;
                }
            })
            .or_insert(submission);
    }

    assignments
        .iter()
        .map(|assignment| JoinedAssignment {
            assignment: assignment.clone(),
            submission: by_assignment
                .get(assignment.id.as_str())
                .map(|s| (*s).clone()),
        })
        .collect()
}
