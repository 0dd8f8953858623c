use crate::models::{SkillName, SkillStatus};

/// Builds the narrative stored on a milestone when a skill status changes.
pub fn generate(
    student_name: &str,
    skill: SkillName,
    new_status: SkillStatus,
    progress_value: Option<&str>,
) -> String {
    let mut narrative = match new_status {
        SkillStatus::Red => format!("{student_name} needs attention in {skill}."),
        SkillStatus::Yellow => format!("{student_name} is now progressing in {skill}."),
        SkillStatus::Green => {
            format!("{student_name} has shown good performance in {skill}.")
        }
        SkillStatus::Gold => {
            format!("{student_name} has exceeded expectations in {skill}!")
        }
    };

    if let Some(value) = progress_value {
        narrative.push_str(&format!(" They can now handle a '{value}'."));
    }

    narrative
}
