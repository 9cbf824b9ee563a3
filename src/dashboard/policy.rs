use crate::config::Config;
use crate::models::{Alert, AlertKind, ProgressSummary, Severity, StudentAssignment, StudentStatus};

/// Thresholds behind student status labels, alerts and list sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Alert when a student has more late submissions than this.
    pub late_alert_threshold: usize,
    /// Alert when completion falls below this percentage.
    pub low_completion_threshold: f64,
    /// Completion below this escalates the completion alert to critical.
    pub critical_completion_threshold: f64,
    /// Graded students averaging below this get a grade alert.
    pub low_grade_threshold: f64,
    pub excellent_completion: f64,
    pub excellent_grade: f64,
    pub behind_completion: f64,
    pub upcoming_limit: usize,
    pub recommendation_limit: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            late_alert_threshold: 2,
            low_completion_threshold: 50.0,
            critical_completion_threshold: 25.0,
            low_grade_threshold: 60.0,
            excellent_completion: 90.0,
            excellent_grade: 85.0,
            behind_completion: 75.0,
            upcoming_limit: 5,
            recommendation_limit: 3,
        }
    }
}

impl Policy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            late_alert_threshold: config.late_alert_threshold,
            low_completion_threshold: config.low_completion_threshold,
            ..Self::default()
        }
    }

    fn too_many_late(&self, progress: &ProgressSummary) -> bool {
        progress.late_count > self.late_alert_threshold
    }

    fn low_completion(&self, progress: &ProgressSummary) -> bool {
        progress.total_assignments > 0
            && progress.completion_percentage < self.low_completion_threshold
    }

    fn low_grade(&self, progress: &ProgressSummary) -> bool {
        progress.graded_count > 0 && progress.average_grade < self.low_grade_threshold
    }

    pub fn student_status(&self, progress: &ProgressSummary) -> StudentStatus {
        if progress.total_assignments == 0 {
            StudentStatus::Active
        } else if self.too_many_late(progress) || self.low_completion(progress) {
            StudentStatus::AtRisk
        } else if progress.completion_percentage >= self.excellent_completion
            && progress.average_grade >= self.excellent_grade
        {
            StudentStatus::Excellent
        } else if progress.completion_percentage < self.behind_completion {
            StudentStatus::Behind
        } else {
            StudentStatus::Active
        }
    }

    pub fn alerts_for(&self, student: &StudentAssignment) -> Vec<Alert> {
        let progress = &student.progress;
        let mut alerts = Vec::new();

        if self.too_many_late(progress) {
            let severity = if progress.late_count > self.late_alert_threshold * 2 {
                Severity::Critical
            } else {
                Severity::High
            };
            alerts.push(self.alert(
                student,
                AlertKind::LateSubmissions,
                severity,
                format!(
                    "{} has {} late submissions in {}",
                    student.student_name, progress.late_count, student.course_name
                ),
                true,
            ));
        }

        if self.low_completion(progress) {
            let severity = if progress.completion_percentage < self.critical_completion_threshold {
                Severity::Critical
            } else {
                Severity::High
            };
            alerts.push(self.alert(
                student,
                AlertKind::LowCompletion,
                severity,
                format!(
                    "{} has completed {:.2}% of the work in {}",
                    student.student_name, progress.completion_percentage, student.course_name
                ),
                true,
            ));
        }

        if self.low_grade(progress) {
            alerts.push(self.alert(
                student,
                AlertKind::LowGrade,
                Severity::Medium,
                format!(
                    "{} is averaging {:.2} in {}",
                    student.student_name, progress.average_grade, student.course_name
                ),
                false,
            ));
        }

        alerts
    }

    fn alert(
        &self,
        student: &StudentAssignment,
        kind: AlertKind,
        severity: Severity,
        message: String,
        action_required: bool,
    ) -> Alert {
        Alert {
            id: format!("{}:{}:{}", kind.as_str(), student.course_id, student.student_id),
            student_id: student.student_id.clone(),
            student_name: student.student_name.clone(),
            kind,
            severity,
            message,
            course_name: Some(student.course_name.clone()),
            action_required,
        }
    }
}

/// Most severe first, then by student name and alert id.
pub fn sort_alerts(alerts: &mut [Alert]) {
    alerts.sort_by(|a, b| {
        a.severity
            .cmp(&b.severity)
            .then_with(|| a.student_name.cmp(&b.student_name))
            .then_with(|| a.id.cmp(&b.id))
    });
}
