use crate::models::{AssignmentStatus, CourseWork, StudentSubmission, SubmissionState};
use chrono::{DateTime, Utc};

/// Status label of one assignment for one student. First matching rule wins:
///
/// 1. no submission, due date passed: `Late`
/// 2. no submission otherwise: `Pending`
/// 3. returned: `Returned` (even when graded)
/// 4. assigned grade present: `Graded`
/// 5. turned in: `Submitted`
/// 6. flagged late: `Late`
/// 7. `Pending`
pub fn classify(
    assignment: &CourseWork,
    submission: Option<&StudentSubmission>,
    now: DateTime<Utc>,
) -> AssignmentStatus {
    let submission = match submission {
        None if assignment.is_past_due(now) => return AssignmentStatus::Late,
        None => return AssignmentStatus::Pending,
        Some(submission) => submission,
    };

    if submission.state == SubmissionState::Returned {
        AssignmentStatus::Returned
    } else if submission.assigned_grade.is_some() {
        AssignmentStatus::Graded
    } else if submission.state.is_submitted() {
        AssignmentStatus::Submitted
    } else if submission.late {
        AssignmentStatus::Late
    } else {
        AssignmentStatus::Pending
    }
}

/// Still owed by the student: nothing turned in and no grade.
pub fn is_outstanding(status: AssignmentStatus) -> bool {
    matches!(status, AssignmentStatus::Pending | AssignmentStatus::Late)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Date;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 10, 12, 0, 0).unwrap()
    }

    fn assignment(due: Option<(i32, u32, u32)>) -> CourseWork {
        CourseWork {
            id: "w1".to_string(),
            course_id: "c1".to_string(),
            title: "Lab report".to_string(),
            description: None,
            due_date: due.map(|(year, month, day)| Date { year, month, day }),
            due_time: None,
            max_points: Some(100.0),
            state: None,
            alternate_link: None,
            creation_time: None,
        }
    }

    fn submission(state: SubmissionState, grade: Option<f64>, late: bool) -> StudentSubmission {
        StudentSubmission {
            id: "s1".to_string(),
            course_id: "c1".to_string(),
            course_work_id: "w1".to_string(),
            user_id: "u1".to_string(),
            state,
            late,
            assigned_grade: grade,
            draft_grade: None,
            alternate_link: None,
            creation_time: None,
            update_time: None,
        }
    }

    #[test]
    fn missing_submission_past_due_is_late() {
        let work = assignment(Some((2025, 5, 1)));
        assert_eq!(classify(&work, None, now()), AssignmentStatus::Late);
    }

    #[test]
    fn missing_submission_without_due_or_in_future_is_pending() {
        assert_eq!(classify(&assignment(None), None, now()), AssignmentStatus::Pending);
        let work = assignment(Some((2025, 6, 1)));
        assert_eq!(classify(&work, None, now()), AssignmentStatus::Pending);
    }

    #[test]
    fn returned_wins_over_graded() {
        let work = assignment(None);
        let sub = submission(SubmissionState::Returned, Some(95.0), false);
        assert_eq!(classify(&work, Some(&sub), now()), AssignmentStatus::Returned);
    }

    #[test]
    fn graded_wins_over_submitted_and_late() {
        let work = assignment(Some((2025, 5, 1)));
        let sub = submission(SubmissionState::TurnedIn, Some(70.0), true);
        assert_eq!(classify(&work, Some(&sub), now()), AssignmentStatus::Graded);
    }

    #[test]
    fn turned_in_late_is_submitted() {
        let work = assignment(Some((2025, 5, 1)));
        let sub = submission(SubmissionState::TurnedIn, None, true);
        assert_eq!(classify(&work, Some(&sub), now()), AssignmentStatus::Submitted);
    }

    #[test]
    fn created_and_flagged_late_is_late() {
        let work = assignment(Some((2025, 5, 1)));
        let sub = submission(SubmissionState::Created, None, true);
        assert_eq!(classify(&work, Some(&sub), now()), AssignmentStatus::Late);
    }

    #[test]
    fn reclaimed_without_flags_falls_back_to_pending() {
        let work = assignment(Some((2025, 5, 1)));
        let sub = submission(SubmissionState::ReclaimedByStudent, None, false);
        assert_eq!(classify(&work, Some(&sub), now()), AssignmentStatus::Pending);
        assert!(is_outstanding(AssignmentStatus::Pending));
        assert!(!is_outstanding(AssignmentStatus::Graded));
    }
}
