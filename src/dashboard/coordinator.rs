use crate::api::CourseFilter;
use crate::dashboard::recommend::{recommend, Recommendation, TeacherCapacity, UnassignedStudent};
use crate::dashboard::{Assembler, Policy, Sources};
use crate::error::{DashboardError, FetchError};
use crate::models::{Course, CourseMember};
use crate::progress::{mean, round2};
use crate::store::TeacherStudentLink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Course rosters loaded at once.
const ROSTER_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLoad {
    pub teacher_id: String,
    pub teacher_name: String,
    pub email: Option<String>,
    pub course_ids: Vec<String>,
    pub assigned_students: usize,
    pub commissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub student_id: String,
    pub student_name: String,
    pub email: Option<String>,
    pub course_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatistics {
    pub total_teachers: usize,
    pub total_students: usize,
    pub assigned_students: usize,
    pub unassigned_students: usize,
    pub average_load: f64,
    pub max_load: usize,
    pub min_load: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorDashboard {
    pub teachers: Vec<TeacherLoad>,
    pub unassigned_students: Vec<StudentRef>,
    pub statistics: LoadStatistics,
    pub recommendations: Vec<Recommendation>,
    /// Courses whose rosters could not be loaded.
    pub skipped_courses: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorAssembler {
    policy: Policy,
}

impl CoordinatorAssembler {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }
}

/// A person seen on one or more course rosters.
#[derive(Debug, Clone, Default)]
struct Person {
    name: String,
    email: Option<String>,
    course_ids: BTreeSet<String>,
}

fn collect_people(members: &[CourseMember], into: &mut BTreeMap<String, Person>) {
    for member in members {
        let person = into.entry(member.user_id.clone()).or_default();
        if person.name.is_empty() {
            person.name = member.profile.display_name();
        }
        if person.email.is_none() {
            person.email = member.profile.email_address.clone();
        }
        person.course_ids.insert(member.course_id.clone());
    }
}

/// Split the student universe into assigned and unassigned ids. Links to
/// students outside the universe do not count as assigned.
pub fn partition_students<'a>(
    universe: impl IntoIterator<Item = &'a String>,
    links: &[TeacherStudentLink],
) -> (BTreeSet<String>, BTreeSet<String>) {
    let linked: BTreeSet<&str> = links.iter().map(|l| l.student_id.as_str()).collect();
    universe
        .into_iter()
        .cloned()
        .partition(|id| linked.contains(id.as_str()))
}

fn teacher_loads(
    teachers: &BTreeMap<String, Person>,
    links: &[TeacherStudentLink],
) -> Vec<TeacherLoad> {
    let mut students: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut commissions: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for link in links {
        students
            .entry(link.teacher_id.as_str())
            .or_default()
            .insert(link.student_id.as_str());
        if !link.commission.trim().is_empty() {
            commissions
                .entry(link.teacher_id.as_str())
                .or_default()
                .insert(link.commission.as_str());
        }
    }

    // Teachers only known from links still show up, by id.
    let mut ids: BTreeSet<&str> = teachers.keys().map(String::as_str).collect();
    ids.extend(students.keys().copied());

    ids.into_iter()
        .map(|id| {
            let person = teachers.get(id);
            TeacherLoad {
                teacher_id: id.to_string(),
                teacher_name: person
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| id.to_string()),
                email: person.and_then(|p| p.email.clone()),
                course_ids: person
                    .map(|p| p.course_ids.iter().cloned().collect())
                    .unwrap_or_default(),
                assigned_students: students.get(id).map(BTreeSet::len).unwrap_or(0),
                commissions: commissions
                    .get(id)
                    .map(|c| c.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default(),
            }
        })
        .collect()
}

fn load_statistics(teachers: &[TeacherLoad], total: usize, assigned: usize) -> LoadStatistics {
    let loads: Vec<usize> = teachers.iter().map(|t| t.assigned_students).collect();
    LoadStatistics {
        total_teachers: teachers.len(),
        total_students: total,
        assigned_students: assigned,
        unassigned_students: total - assigned,
        average_load: round2(mean(loads.iter().map(|&l| l as f64))),
        max_load: loads.iter().copied().max().unwrap_or(0),
        min_load: loads.iter().copied().min().unwrap_or(0),
    }
}

#[async_trait]
impl Assembler for CoordinatorAssembler {
    type Output = CoordinatorDashboard;

    async fn assemble(
        &self,
        token: &str,
        sources: Sources<'_>,
        _now: DateTime<Utc>,
    ) -> Result<CoordinatorDashboard, DashboardError> {
        let classroom = sources.classroom;
        let courses: Vec<Course> = classroom
            .list_courses(token, &CourseFilter::All)
            .await
            .map_err(DashboardError::from_fetch)?;
        let links = sources.store.links().await?;
        tracing::debug!(courses = courses.len(), links = links.len(), "loaded coordinator scope");

        let results: Vec<_> = stream::iter(courses)
            .map(|course| async move {
                let rosters = async {
                    let teachers = classroom.list_teachers(token, &course.id).await?;
                    let students = classroom.list_students(token, &course.id).await?;
                    Ok::<_, FetchError>((teachers, students))
                }
                .await;
                (course, rosters)
            })
            .buffered(ROSTER_CONCURRENCY)
            .collect()
            .await;

        let mut teachers: BTreeMap<String, Person> = BTreeMap::new();
        let mut students: BTreeMap<String, Person> = BTreeMap::new();
        let mut skipped_courses = Vec::new();
        for (course, rosters) in results {
            match rosters {
                Ok((course_teachers, course_students)) => {
                    collect_people(&course_teachers, &mut teachers);
                    collect_people(&course_students, &mut students);
                }
                Err(e) if e.is_unauthorized() => return Err(DashboardError::from_fetch(e)),
                Err(e) => {
                    tracing::warn!(course_id = %course.id, error = %e, "skipping course roster");
                    skipped_courses.push(course.id);
                }
            }
        }

        let (assigned, unassigned) = partition_students(students.keys(), &links);
        let loads = teacher_loads(&teachers, &links);
        let statistics = load_statistics(&loads, students.len(), assigned.len());

        let unassigned_students: Vec<StudentRef> = unassigned
            .iter()
            .filter_map(|id| students.get(id).map(|p| (id, p)))
            .map(|(id, p)| StudentRef {
                student_id: id.clone(),
                student_name: p.name.clone(),
                email: p.email.clone(),
                course_ids: p.course_ids.iter().cloned().collect(),
            })
            .collect();

        let capacities: Vec<TeacherCapacity> = loads
            .iter()
            .map(|t| TeacherCapacity {
                teacher_id: t.teacher_id.clone(),
                teacher_name: t.teacher_name.clone(),
                course_ids: t.course_ids.iter().cloned().collect(),
                current_load: t.assigned_students,
            })
            .collect();
        let candidates: Vec<UnassignedStudent> = unassigned_students
            .iter()
            .map(|s| UnassignedStudent {
                student_id: s.student_id.clone(),
                student_name: s.student_name.clone(),
                course_ids: s.course_ids.iter().cloned().collect(),
            })
            .collect();
        let recommendations = recommend(&candidates, &capacities, self.policy.recommendation_limit);

        Ok(CoordinatorDashboard {
            teachers: loads,
            unassigned_students,
            statistics,
            recommendations,
            skipped_courses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joiner::tests::{course, member, FakeClassroom};
    use crate::store::{AssignmentStore, MemoryAssignmentStore};

    fn classroom() -> FakeClassroom {
        let mut fake = FakeClassroom {
            courses: vec![course("c1", "Math", Some("M1")), course("c2", "Art", None)],
            ..Default::default()
        };
        fake.teachers.insert(
            "c1".to_string(),
            vec![member("c1", "t1", "Turing"), member("c1", "t2", "Noether")],
        );
        fake.teachers.insert("c2".to_string(), vec![member("c2", "t2", "Noether")]);
        fake.students.insert(
            "c1".to_string(),
            vec![member("c1", "s1", "Sid"), member("c1", "s2", "Sue"), member("c1", "s3", "Sal")],
        );
        fake.students.insert(
            "c2".to_string(),
            vec![member("c2", "s3", "Sal"), member("c2", "s4", "Sky")],
        );
        fake
    }

    async fn store() -> MemoryAssignmentStore {
        let store = MemoryAssignmentStore::default();
        store
            .assign(TeacherStudentLink::new("t1", "s1", "c1", "M1"))
            .await
            .unwrap();
        store
            .assign(TeacherStudentLink::new("t1", "s2", "c1", "M1"))
            .await
            .unwrap();
        store
            .assign(TeacherStudentLink::new("t3", "ghost", "c9", "X"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn finds_unassigned_students_and_ranks_teachers() {
        let fake = classroom();
        let store = store().await;
        let sources = Sources {
            classroom: &fake,
            store: &store,
        };

        let dashboard = CoordinatorAssembler::new(Policy::default())
            .assemble("token", sources, Utc::now())
            .await
            .unwrap();

        let unassigned: Vec<&str> = dashboard
            .unassigned_students
            .iter()
            .map(|s| s.student_id.as_str())
            .collect();
        assert_eq!(unassigned, vec!["s3", "s4"]);

        let stats = &dashboard.statistics;
        assert_eq!(stats.total_students, 4);
        assert_eq!(stats.assigned_students, 2);
        assert_eq!(stats.unassigned_students + stats.assigned_students, stats.total_students);

        let t1 = dashboard.teachers.iter().find(|t| t.teacher_id == "t1").unwrap();
        assert_eq!(t1.assigned_students, 2);
        assert_eq!(t1.commissions, vec!["M1".to_string()]);
        let t3 = dashboard.teachers.iter().find(|t| t.teacher_id == "t3").unwrap();
        assert_eq!(t3.teacher_name, "t3");
        assert!(t3.course_ids.is_empty());

        // s3 shares c1 and c2 with t2, who also has no students yet
        let s3 = &dashboard.recommendations[0];
        assert_eq!(s3.student_id, "s3");
        assert_eq!(s3.candidates[0].teacher_id, "t2");
        assert_eq!(s3.candidates[0].shared_courses, 2);
        assert!(s3.candidates.iter().all(|c| c.teacher_id != "t3"));
    }

    #[tokio::test]
    async fn broken_roster_is_skipped() {
        let mut fake = classroom();
        fake.failing_courses.insert("c2".to_string());
        let store = store().await;
        let sources = Sources {
            classroom: &fake,
            store: &store,
        };

        let dashboard = CoordinatorAssembler::new(Policy::default())
            .assemble("token", sources, Utc::now())
            .await
            .unwrap();

        assert_eq!(dashboard.skipped_courses, vec!["c2".to_string()]);
        assert_eq!(dashboard.statistics.total_students, 3);
        let unassigned: Vec<&str> = dashboard
            .unassigned_students
            .iter()
            .map(|s| s.student_id.as_str())
            .collect();
        assert_eq!(unassigned, vec!["s3"]);
    }

    #[test]
    fn complement_covers_the_universe() {
        let universe: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let links = vec![
            TeacherStudentLink::new("t1", "a", "c1", "A"),
            TeacherStudentLink::new("t2", "c", "c1", "A"),
            TeacherStudentLink::new("t2", "outsider", "c1", "A"),
        ];

        let (assigned, unassigned) = partition_students(universe.iter(), &links);

        assert_eq!(assigned.len() + unassigned.len(), universe.len());
        assert!(assigned.contains("a") && assigned.contains("c"));
        assert!(!assigned.contains("outsider"));
        assert_eq!(unassigned.into_iter().collect::<Vec<_>>(), vec!["b", "d"]);
    }
}
