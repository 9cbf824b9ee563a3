//! Teacher to student assignments.
//!
//! Classroom has no notion of a teacher being responsible for a subset of a
//! course's students, so these links live outside the API behind
//! [`AssignmentStore`].

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherStudentLink {
    pub teacher_id: String,
    pub student_id: String,
    pub course_id: String,
    pub commission: String,
    pub assigned_at: DateTime<Utc>,
}

impl TeacherStudentLink {
    pub fn new(
        teacher_id: impl Into<String>,
        student_id: impl Into<String>,
        course_id: impl Into<String>,
        commission: impl Into<String>,
    ) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            student_id: student_id.into(),
            course_id: course_id.into(),
            commission: commission.into(),
            assigned_at: Utc::now(),
        }
    }

    fn same_slot(&self, other: &TeacherStudentLink) -> bool {
        self.teacher_id == other.teacher_id
            && self.student_id == other.student_id
            && self.course_id == other.course_id
    }
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn links(&self) -> Result<Vec<TeacherStudentLink>, StoreError>;

    async fn links_for_teacher(&self, teacher_id: &str) -> Result<Vec<TeacherStudentLink>, StoreError> {
        Ok(self
            .links()
            .await?
            .into_iter()
            .filter(|l| l.teacher_id == teacher_id)
            .collect())
    }

    /// Insert, or replace the link for the same teacher, student and course.
    async fn assign(&self, link: TeacherStudentLink) -> Result<(), StoreError>;

    /// Remove every link between the teacher and the student.
    async fn unassign(&self, teacher_id: &str, student_id: &str) -> Result<bool, StoreError>;
}

fn upsert(links: &mut Vec<TeacherStudentLink>, link: TeacherStudentLink) {
    match links.iter_mut().find(|l| l.same_slot(&link)) {
        Some(existing) => *existing = link,
        None => links.push(link),
    }
}

fn remove(links: &mut Vec<TeacherStudentLink>, teacher_id: &str, student_id: &str) -> bool {
    let before = links.len();
    links.retain(|l| !(l.teacher_id == teacher_id && l.student_id == student_id));
    links.len() != before
}

#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    links: RwLock<Vec<TeacherStudentLink>>,
}

impl MemoryAssignmentStore {
    pub fn new(links: Vec<TeacherStudentLink>) -> Self {
        Self {
            links: RwLock::new(links),
        }
    }
}

#[async_trait]
impl AssignmentStore for MemoryAssignmentStore {
    async fn links(&self) -> Result<Vec<TeacherStudentLink>, StoreError> {
        Ok(self.links.read().await.clone())
    }

    async fn assign(&self, link: TeacherStudentLink) -> Result<(), StoreError> {
        upsert(&mut *self.links.write().await, link);
        Ok(())
    }

    async fn unassign(&self, teacher_id: &str, student_id: &str) -> Result<bool, StoreError> {
        Ok(remove(&mut *self.links.write().await, teacher_id, student_id))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct YamlDocument {
    #[serde(default)]
    links: Vec<TeacherStudentLink>,
}

/// Links kept in a YAML file. A missing file is an empty store; every write
/// rewrites the whole file.
#[derive(Debug)]
pub struct YamlAssignmentStore {
    path: PathBuf,
    lock: RwLock<()>,
}

impl YamlAssignmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    async fn read(&self) -> Result<Vec<TeacherStudentLink>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.display_path(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let document: YamlDocument =
            serde_yaml::from_str(&raw).map_err(|e| StoreError::Parse {
                path: self.display_path(),
                message: e.to_string(),
            })?;
        Ok(document.links)
    }

    async fn write(&self, links: Vec<TeacherStudentLink>) -> Result<(), StoreError> {
        let raw = serde_yaml::to_string(&YamlDocument { links }).map_err(|e| StoreError::Parse {
            path: self.display_path(),
            message: e.to_string(),
        })?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|source| StoreError::Io {
                path: self.display_path(),
                source,
            })
    }
}

#[async_trait]
impl AssignmentStore for YamlAssignmentStore {
    async fn links(&self) -> Result<Vec<TeacherStudentLink>, StoreError> {
        let _guard = self.lock.read().await;
        self.read().await
    }

    async fn assign(&self, link: TeacherStudentLink) -> Result<(), StoreError> {
        let _guard = self.lock.write().await;
        let mut links = self.read().await?;
        upsert(&mut links, link);
        self.write(links).await
    }

    async fn unassign(&self, teacher_id: &str, student_id: &str) -> Result<bool, StoreError> {
        let _guard = self.lock.write().await;
        let mut links = self.read().await?;
        let removed = remove(&mut links, teacher_id, student_id);
        if removed {
            self.write(links).await?;
        }
        Ok(removed)
    }
}
