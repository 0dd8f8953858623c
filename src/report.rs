use std::collections::HashMap;
use std::fmt::Write;

use anyhow::Context;
use uuid::Uuid;

use crate::models::{
    MilestoneRecord, SkillName, SkillRecord, SkillStatus, StatusShare, StudentRecord,
    StudentStatusSummary,
};

/// Class roster as CSV: one row per student, one column per skill holding the
/// current status label. Students without a skill record get an empty cell.
pub fn class_roster_csv(
    students: &[StudentRecord],
    skills: &[SkillRecord],
) -> anyhow::Result<String> {
    let mut by_student: HashMap<Uuid, HashMap<SkillName, SkillStatus>> = HashMap::new();
    for skill in skills {
        by_student
            .entry(skill.student_id)
            .or_default()
            .insert(skill.name, skill.current_status);
    }

    let mut writer = csv::Writer::from_writer(vec![]);

    let mut header = vec!["Student Name".to_string()];
    header.extend(SkillName::ALL.iter().map(|name| name.label().to_string()));
    writer.write_record(&header)?;

    for student in students {
        let mut record = vec![student.name.clone()];
        for name in SkillName::ALL {
            let cell = by_student
                .get(&student.id)
                .and_then(|statuses| statuses.get(&name))
                .map(|status| status.label().to_string())
                .unwrap_or_default();
            record.push(cell);
        }
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow::anyhow!("failed to flush csv writer: {err}"))?;
    String::from_utf8(bytes).context("csv output was not valid utf-8")
}

/// Markdown progress report for one student: status overview, then the
/// milestone timeline most recent first.
pub fn build_student_report(
    student: &StudentRecord,
    class_name: &str,
    summary: &StudentStatusSummary,
    milestones: &[MilestoneRecord],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Student Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} ({}), enrolled {}",
        student.name, class_name, student.enrollment_date
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Current Status Overview");

    if summary.total == 0 {
        let _ = writeln!(output, "No skills recorded.");
    } else {
        let shares: [(&str, StatusShare); 4] = [
            ("Red", summary.red),
            ("Yellow", summary.yellow),
            ("Green", summary.green),
            ("Gold", summary.gold),
        ];
        for (label, share) in shares {
            let _ = writeln!(
                output,
                "- {}: {} of {} skills ({:.1}%)",
                label, share.count, summary.total, share.percentage
            );
        }
    }

    let mut timeline = milestones.to_vec();
    timeline.sort_by(|a, b| {
        b.recorded_at
            .cmp(&a.recorded_at)
            .then(b.id.cmp(&a.id))
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Progress Timeline (Most Recent First)");

    if timeline.is_empty() {
        let _ = writeln!(output, "No milestones recorded.");
    } else {
        for milestone in timeline.iter() {
            let previous = milestone
                .previous_status
                .map(|status| status.label())
                .unwrap_or("None");
            let _ = writeln!(
                output,
                "- {} {}: {} -> {}",
                milestone.recorded_at.format("%Y-%m-%d %H:%M"),
                milestone.skill_name,
                previous,
                milestone.new_status
            );
            let _ = writeln!(output, "  {}", milestone.narrative);
            if let Some(comment) = &milestone.comment {
                let _ = writeln!(output, "  Teacher: {comment}");
            }
        }
    }

    output
}
