use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A teacher that could take on more students.
#[derive(Debug, Clone, PartialEq)]
pub struct TeacherCapacity {
    pub teacher_id: String,
    pub teacher_name: String,
    pub course_ids: BTreeSet<String>,
    pub current_load: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnassignedStudent {
    pub student_id: String,
    pub student_name: String,
    pub course_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub teacher_id: String,
    pub teacher_name: String,
    pub shared_courses: usize,
    pub current_load: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub student_id: String,
    pub student_name: String,
    pub candidates: Vec<Candidate>,
}

/// Higher is better. One more shared course always outweighs any difference
/// in load, since the load term stays within (0, 1].
pub fn score(shared_courses: usize, current_load: usize) -> f64 {
    2.0 * shared_courses as f64 + 1.0 / (1.0 + current_load as f64)
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.teacher_id.cmp(&b.teacher_id))
}

/// Up to `limit` ranked teachers per student. Teachers without courses are
/// never proposed.
pub fn recommend(
    students: &[UnassignedStudent],
    teachers: &[TeacherCapacity],
    limit: usize,
) -> Vec<Recommendation> {
    students
        .iter()
        .map(|student| {
            let mut candidates: Vec<Candidate> = teachers
                .iter()
                .filter(|t| !t.course_ids.is_empty())
                .map(|t| {
                    let shared = t.course_ids.intersection(&student.course_ids).count();
                    Candidate {
                        teacher_id: t.teacher_id.clone(),
                        teacher_name: t.teacher_name.clone(),
                        shared_courses: shared,
                        current_load: t.current_load,
                        score: score(shared, t.current_load),
                    }
                })
                .collect();
            candidates.sort_by(rank);
            candidates.truncate(limit);

            Recommendation {
                student_id: student.student_id.clone(),
                student_name: student.student_name.clone(),
                candidates,
            }
        })
        .collect()
}
