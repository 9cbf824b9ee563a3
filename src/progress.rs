use crate::models::{AnnotatedSubmission, CourseWork, StudentProgress, StudentSubmission};
use std::collections::HashMap;

pub const UNKNOWN_ASSIGNMENT: &str = "Unknown Assignment";

/// Round half up to two decimals. Inputs here are never negative.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// `100 * part / whole` rounded to two decimals, 0 for an empty whole.
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2((part as f64 / whole as f64) * 100.0)
    }
}

/// Mean of the values, 0 for an empty input.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Progress of one student over one course, or over several courses when the
/// inputs are concatenated and `course_id` is `None`.
pub fn compute_progress(
    student_id: &str,
    course_id: Option<&str>,
    assignments: &[CourseWork],
    submissions: &[StudentSubmission],
) -> StudentProgress {
    let titles: HashMap<&str, &str> = assignments
        .iter()
        .map(|a| (a.id.as_str(), a.title.as_str()))
        .collect();

    let total_assignments = assignments.len();
    let submitted_count = submissions.iter().filter(|s| s.state.is_submitted()).count();
    let graded_count = submissions
        .iter()
        .filter(|s| s.assigned_grade.is_some())
        .count();
    let late_count = submissions.iter().filter(|s| s.late).count();

    let average_grade = round2(mean(submissions.iter().filter_map(|s| s.assigned_grade)));
    // Submissions for assignments outside the joined set cannot push this over 100.
    let completion_percentage = percentage(submitted_count, total_assignments).min(100.0);

    let submissions = submissions
        .iter()
        .map(|s| AnnotatedSubmission {
            assignment_title: titles
                .get(s.course_work_id.as_str())
                .copied()
                .unwrap_or(UNKNOWN_ASSIGNMENT)
                .to_string(),
            submission: s.clone(),
        })
        .collect();

    StudentProgress {
        course_id: course_id.map(str::to_string),
        student_id: student_id.to_string(),
        total_assignments,
        submitted_count,
        graded_count,
        late_count,
        average_grade,
        completion_percentage,
        submissions,
    }
}

/// Cross-course rollup. Counts are summed and the average is recomputed from
/// every graded submission, so the result does not depend on input order.
pub fn merge_progress(student_id: &str, parts: &[StudentProgress]) -> StudentProgress {
    let mut submissions: Vec<AnnotatedSubmission> = parts
        .iter()
        .flat_map(|p| p.submissions.iter().cloned())
        .collect();
    submissions.sort_by(|a, b| {
        (
            &a.submission.course_id,
            &a.submission.course_work_id,
            &a.submission.id,
        )
            .cmp(&(
                &b.submission.course_id,
                &b.submission.course_work_id,
                &b.submission.id,
            ))
    });

    let total_assignments: usize = parts.iter().map(|p| p.total_assignments).sum();
    let submitted_count: usize = parts.iter().map(|p| p.submitted_count).sum();

    StudentProgress {
        course_id: None,
        student_id: student_id.to_string(),
        total_assignments,
        submitted_count,
        graded_count: parts.iter().map(|p| p.graded_count).sum(),
        late_count: parts.iter().map(|p| p.late_count).sum(),
        average_grade: round2(mean(
            submissions.iter().filter_map(|s| s.submission.assigned_grade),
        )),
        completion_percentage: percentage(submitted_count, total_assignments).min(100.0),
        submissions,
    }
}
