use crate::models::{StudentAssignment, StudentStatus};
use crate::progress::{mean, percentage, round2};
use indexmap::IndexMap;
use serde::Serialize;

/// Students sharing a course section, with aggregate metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub name: String,
    pub total_students: usize,
    pub students_at_risk: usize,
    /// Mean completion percentage of the students.
    pub average_progress: f64,
    /// Mean of the average grade of students that have at least one grade.
    pub average_grade: f64,
    /// Submitted work over assigned work across the whole commission.
    pub completion_rate: f64,
    pub students: Vec<StudentAssignment>,
}

impl Commission {
    fn from_students(name: String, students: Vec<StudentAssignment>) -> Self {
        let submitted: usize = students.iter().map(|s| s.progress.submitted_count).sum();
        let assigned: usize = students.iter().map(|s| s.progress.total_assignments).sum();

        Self {
            total_students: students.len(),
            students_at_risk: students
                .iter()
                .filter(|s| s.status == StudentStatus::AtRisk)
                .count(),
            average_progress: round2(mean(
                students.iter().map(|s| s.progress.completion_percentage),
            )),
            average_grade: round2(mean(
                students
                    .iter()
                    .filter(|s| s.progress.graded_count > 0)
                    .map(|s| s.progress.average_grade),
            )),
            completion_rate: percentage(submitted, assigned).min(100.0),
            name,
            students,
        }
    }
}

/// Group students by commission name, keeping the order in which commissions
/// first appear in the input.
pub fn group_by_commission(students: &[StudentAssignment]) -> Vec<Commission> {
    let mut groups: IndexMap<String, Vec<StudentAssignment>> = IndexMap::new();
    for student in students {
        groups
            .entry(student.commission.clone())
            .or_default()
            .push(student.clone());
    }

    groups
        .into_iter()
        .map(|(name, members)| Commission::from_students(name, members))
        .collect()
}
