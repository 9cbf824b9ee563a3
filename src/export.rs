use crate::dashboard::student::AssignmentRow;
use crate::dashboard::Commission;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

fn optional_number(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// Export the student "all assignments" table to CSV
pub fn export_assignments_csv(rows: &[AssignmentRow], path: impl AsRef<Path>) -> Result<PathBuf> {
    if rows.is_empty() {
        anyhow::bail!("No assignments to export");
    }
    let filepath = path.as_ref().to_path_buf();

    let mut wtr = csv::Writer::from_path(&filepath)
        .with_context(|| format!("Failed to create CSV file {}", filepath.display()))?;

    wtr.write_record([
        "course_id",
        "course_name",
        "assignment_id",
        "title",
        "due_at",
        "status",
        "assigned_grade",
        "max_points",
        "late",
    ])
    .context("Failed to write CSV headers")?;

    for row in rows {
        wtr.write_record([
            row.course_id.clone(),
            row.course_name.clone(),
            row.assignment_id.clone(),
            row.title.clone(),
            row.due_at.map(|d| d.to_rfc3339()).unwrap_or_default(),
            row.status.as_str().to_string(),
            optional_number(row.assigned_grade),
            optional_number(row.max_points),
            row.late.to_string(),
        ])
        .context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    tracing::info!(rows = rows.len(), path = %filepath.display(), "exported assignments");

    Ok(filepath)
}

/// Export per-commission statistics to CSV
pub fn export_commissions_csv(commissions: &[Commission], path: impl AsRef<Path>) -> Result<PathBuf> {
    if commissions.is_empty() {
        anyhow::bail!("No commissions to export");
    }
    let filepath = path.as_ref().to_path_buf();

    let mut wtr = csv::Writer::from_path(&filepath)
        .with_context(|| format!("Failed to create CSV file {}", filepath.display()))?;

    wtr.write_record([
        "commission",
        "total_students",
        "students_at_risk",
        "average_progress",
        "average_grade",
        "completion_rate",
    ])
    .context("Failed to write CSV headers")?;

    for commission in commissions {
        wtr.write_record([
            commission.name.clone(),
            commission.total_students.to_string(),
            commission.students_at_risk.to_string(),
            format!("{:.2}", commission.average_progress),
            format!("{:.2}", commission.average_grade),
            format!("{:.2}", commission.completion_rate),
        ])
        .context("Failed to write CSV record")?;
    }

    wtr.flush().context("Failed to flush CSV writer")?;
    tracing::info!(commissions = commissions.len(), path = %filepath.display(), "exported commissions");

    Ok(filepath)
}
