use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Proficiency tier for a skill, ordered Red < Yellow < Green < Gold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, sqlx::Type, ValueEnum,
)]
#[sqlx(type_name = "skill_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Red,
    Yellow,
    Green,
    Gold,
}

impl SkillStatus {
    /// The numeric mapping every aggregation routine shares. Red=1 .. Gold=4.
    pub fn score(self) -> f64 {
        match self {
            SkillStatus::Red => 1.0,
            SkillStatus::Yellow => 2.0,
            SkillStatus::Green => 3.0,
            SkillStatus::Gold => 4.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SkillStatus::Red => "Red",
            SkillStatus::Yellow => "Yellow",
            SkillStatus::Green => "Green",
            SkillStatus::Gold => "Gold",
        }
    }
}

impl fmt::Display for SkillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The fixed set of skills every student carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type, ValueEnum)]
#[sqlx(type_name = "skill_name", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SkillName {
    Listening,
    Reading,
    Speaking,
    Writing,
}

impl SkillName {
    pub const ALL: [SkillName; 4] = [
        SkillName::Listening,
        SkillName::Reading,
        SkillName::Speaking,
        SkillName::Writing,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SkillName::Listening => "Listening",
            SkillName::Reading => "Reading",
            SkillName::Speaking => "Speaking",
            SkillName::Writing => "Writing",
        }
    }
}

impl fmt::Display for SkillName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: Uuid,
    pub name: String,
    pub class_id: Uuid,
    pub enrollment_date: NaiveDate,
    pub archived: bool,
}

#[derive(Debug, Clone)]
pub struct SkillRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub name: SkillName,
    pub current_status: SkillStatus,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MilestoneRecord {
    pub id: i64,
    pub student_id: Uuid,
    pub skill_name: SkillName,
    pub previous_status: Option<SkillStatus>,
    pub new_status: SkillStatus,
    pub comment: Option<String>,
    pub progress_value: Option<String>,
    pub narrative: String,
    pub recorded_at: DateTime<Utc>,
}

/// One value per fixed skill name. Guarantees the four keys are always present
/// in aggregation output, even for an empty class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerSkill<T> {
    pub listening: T,
    pub reading: T,
    pub speaking: T,
    pub writing: T,
}

impl<T> PerSkill<T> {
    pub fn get(&self, name: SkillName) -> &T {
        match name {
            SkillName::Listening => &self.listening,
            SkillName::Reading => &self.reading,
            SkillName::Speaking => &self.speaking,
            SkillName::Writing => &self.writing,
        }
    }

    pub fn get_mut(&mut self, name: SkillName) -> &mut T {
        match name {
            SkillName::Listening => &mut self.listening,
            SkillName::Reading => &mut self.reading,
            SkillName::Speaking => &mut self.speaking,
            SkillName::Writing => &mut self.writing,
        }
    }
}

/// Counts per status tier. Also used for the weighted student distribution,
/// where the tier doubles as the score category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
    pub gold: u32,
}

impl StatusCounts {
    pub fn increment(&mut self, status: SkillStatus) {
        match status {
            SkillStatus::Red => self.red += 1,
            SkillStatus::Yellow => self.yellow += 1,
            SkillStatus::Green => self.green += 1,
            SkillStatus::Gold => self.gold += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.red + self.yellow + self.green + self.gold
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrendCounts {
    pub improvements: u32,
    pub declines: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillComparison {
    pub skill_name: SkillName,
    pub student_score: f64,
    pub class_average_score: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatusShare {
    pub count: u32,
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentStatusSummary {
    pub red: StatusShare,
    pub yellow: StatusShare,
    pub green: StatusShare,
    pub gold: StatusShare,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_scores_are_ordered() {
        assert_eq!(SkillStatus::Red.score(), 1.0);
        assert_eq!(SkillStatus::Yellow.score(), 2.0);
        assert_eq!(SkillStatus::Green.score(), 3.0);
        assert_eq!(SkillStatus::Gold.score(), 4.0);
        assert!(SkillStatus::Red < SkillStatus::Yellow);
        assert!(SkillStatus::Green < SkillStatus::Gold);
    }

    #[test]
    fn per_skill_lookup_matches_field() {
        let mut per_skill = PerSkill::<u32>::default();
        *per_skill.get_mut(SkillName::Speaking) = 7;
        assert_eq!(*per_skill.get(SkillName::Speaking), 7);
        assert_eq!(per_skill.speaking, 7);
        assert_eq!(per_skill.listening, 0);
    }

    #[test]
    fn status_counts_track_each_tier() {
        let mut counts = StatusCounts::default();
        counts.increment(SkillStatus::Red);
        counts.increment(SkillStatus::Gold);
        counts.increment(SkillStatus::Gold);
        assert_eq!(counts.red, 1);
        assert_eq!(counts.gold, 2);
        assert_eq!(counts.total(), 3);
    }
}
