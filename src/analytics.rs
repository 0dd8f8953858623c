use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    MilestoneRecord, PerSkill, SkillComparison, SkillName, SkillRecord, SkillStatus, StatusCounts,
    StatusShare, StudentRecord, StudentStatusSummary, TrendCounts,
};

/// Lower bound of the trailing trend window. Non-positive windows are
/// normalized to one day.
pub fn window_cutoff(window_days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(window_days.max(1))
}

/// Per-skill counts of current statuses across a class's skill records.
pub fn status_breakdown(skills: &[SkillRecord]) -> PerSkill<StatusCounts> {
    let mut breakdown = PerSkill::<StatusCounts>::default();

    for skill in skills {
        breakdown.get_mut(skill.name).increment(skill.current_status);
    }

    breakdown
}

/// Mean status score of a student's skills. A student with no skills scores
/// at the minimum.
pub fn weighted_score(statuses: &[SkillStatus]) -> f64 {
    if statuses.is_empty() {
        return 1.0;
    }
    statuses.iter().map(|status| status.score()).sum::<f64>() / statuses.len() as f64
}

/// Maps a weighted score onto a category tier via half-open buckets.
/// Gold is the default branch, catching any score outside the nominal range.
pub fn score_category(score: f64) -> SkillStatus {
    if (1.0..2.0).contains(&score) {
        SkillStatus::Red
    } else if (2.0..2.6).contains(&score) {
        SkillStatus::Yellow
    } else if (2.6..3.3).contains(&score) {
        SkillStatus::Green
    } else {
        SkillStatus::Gold
    }
}

/// How many of a class's students land in each score category.
pub fn weighted_distribution(
    students: &[StudentRecord],
    skills: &[SkillRecord],
) -> StatusCounts {
    let mut by_student: HashMap<Uuid, Vec<SkillStatus>> = HashMap::new();
    for skill in skills {
        by_student
            .entry(skill.student_id)
            .or_default()
            .push(skill.current_status);
    }

    let mut distribution = StatusCounts::default();
    for student in students {
        let statuses = by_student
            .get(&student.id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        distribution.increment(score_category(weighted_score(statuses)));
    }

    distribution
}

/// Improvement/decline counts per skill over milestones within the window.
/// Milestones without a previous status record the initial transition and do
/// not count in either direction.
pub fn skill_trends(
    milestones: &[MilestoneRecord],
    cutoff: DateTime<Utc>,
) -> PerSkill<TrendCounts> {
    let mut trends = PerSkill::<TrendCounts>::default();

    for milestone in milestones {
        if milestone.recorded_at < cutoff {
            continue;
        }
        let Some(previous) = milestone.previous_status else {
            continue;
        };

        let entry = trends.get_mut(milestone.skill_name);
        if milestone.new_status.score() > previous.score() {
            entry.improvements += 1;
        } else if milestone.new_status.score() < previous.score() {
            entry.declines += 1;
        }
    }

    trends
}

/// Mean status score per skill name over a class's current skill records.
/// Skill names with no records average 0.0.
pub fn class_average_scores(skills: &[SkillRecord]) -> PerSkill<f64> {
    let mut sums = PerSkill::<(f64, u32)>::default();
    for skill in skills {
        let entry = sums.get_mut(skill.name);
        entry.0 += skill.current_status.score();
        entry.1 += 1;
    }

    let mut averages = PerSkill::<f64>::default();
    for name in SkillName::ALL {
        let (total, count) = *sums.get(name);
        *averages.get_mut(name) = if count == 0 { 0.0 } else { total / f64::from(count) };
    }

    averages
}

/// A student's per-skill scores next to the class baseline.
pub fn class_comparison(
    student_skills: &[SkillRecord],
    class_averages: &PerSkill<f64>,
) -> Vec<SkillComparison> {
    student_skills
        .iter()
        .map(|skill| SkillComparison {
            skill_name: skill.name,
            student_score: skill.current_status.score(),
            class_average_score: *class_averages.get(skill.name),
        })
        .collect()
}

/// Count and share of each status across one student's skills. All zeros when
/// the student has no skills.
pub fn student_status_summary(skills: &[SkillRecord]) -> StudentStatusSummary {
    let mut counts = StatusCounts::default();
    for skill in skills {
        counts.increment(skill.current_status);
    }

    let total = counts.total();
    let share = |count: u32| StatusShare {
        count,
        percentage: if total == 0 {
            0.0
        } else {
            f64::from(count) / f64::from(total) * 100.0
        },
    };

    StudentStatusSummary {
        red: share(counts.red),
        yellow: share(counts.yellow),
        green: share(counts.green),
        gold: share(counts.gold),
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn skill(student_id: Uuid, name: SkillName, status: SkillStatus) -> SkillRecord {
        SkillRecord {
            id: Uuid::new_v4(),
            student_id,
            name,
            current_status: status,
            last_updated: Utc::now(),
        }
    }

    fn student(id: Uuid, class_id: Uuid, name: &str) -> StudentRecord {
        StudentRecord {
            id,
            name: name.to_string(),
            class_id,
            enrollment_date: NaiveDate::from_ymd_opt(2026, 1, 12).unwrap(),
            archived: false,
        }
    }

    fn milestone(
        skill_name: SkillName,
        previous: Option<SkillStatus>,
        new_status: SkillStatus,
        days_ago: i64,
    ) -> MilestoneRecord {
        MilestoneRecord {
            id: 0,
            student_id: Uuid::new_v4(),
            skill_name,
            previous_status: previous,
            new_status,
            comment: None,
            progress_value: None,
            narrative: String::new(),
            recorded_at: Utc::now() - Duration::days(days_ago),
        }
    }

    fn full_status_set(student_id: Uuid, status: SkillStatus) -> Vec<SkillRecord> {
        SkillName::ALL
            .iter()
            .map(|&name| skill(student_id, name, status))
            .collect()
    }

    #[test]
    fn breakdown_covers_all_skills_for_empty_class() {
        let breakdown = status_breakdown(&[]);
        for name in SkillName::ALL {
            assert_eq!(*breakdown.get(name), StatusCounts::default());
        }
    }

    #[test]
    fn breakdown_counts_by_skill_and_status() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let skills = vec![
            skill(a, SkillName::Listening, SkillStatus::Green),
            skill(b, SkillName::Listening, SkillStatus::Green),
            skill(a, SkillName::Writing, SkillStatus::Red),
        ];

        let breakdown = status_breakdown(&skills);
        assert_eq!(breakdown.listening.green, 2);
        assert_eq!(breakdown.writing.red, 1);
        assert_eq!(breakdown.reading, StatusCounts::default());
        assert_eq!(breakdown.speaking, StatusCounts::default());
    }

    #[test]
    fn weighted_score_of_no_skills_is_minimum() {
        assert_eq!(weighted_score(&[]), 1.0);
        assert_eq!(score_category(weighted_score(&[])), SkillStatus::Red);
    }

    #[test]
    fn weighted_score_stays_in_range() {
        let statuses = [
            SkillStatus::Red,
            SkillStatus::Yellow,
            SkillStatus::Green,
            SkillStatus::Gold,
        ];
        let score = weighted_score(&statuses);
        assert!((1.0..=4.0).contains(&score));
        assert!((score - 2.5).abs() < 1e-9);
    }

    #[test]
    fn category_boundaries_are_half_open() {
        assert_eq!(score_category(1.0), SkillStatus::Red);
        assert_eq!(score_category(1.999), SkillStatus::Red);
        assert_eq!(score_category(2.0), SkillStatus::Yellow);
        assert_eq!(score_category(2.599), SkillStatus::Yellow);
        assert_eq!(score_category(2.6), SkillStatus::Green);
        assert_eq!(score_category(3.299), SkillStatus::Green);
        assert_eq!(score_category(3.3), SkillStatus::Gold);
        assert_eq!(score_category(4.0), SkillStatus::Gold);
    }

    #[test]
    fn out_of_range_scores_fall_to_gold() {
        assert_eq!(score_category(4.5), SkillStatus::Gold);
        assert_eq!(score_category(0.5), SkillStatus::Gold);
    }

    #[test]
    fn distribution_separates_extremes() {
        let class_id = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let students = vec![student(a, class_id, "Avery Lee"), student(b, class_id, "Jules Moreno")];
        let mut skills = full_status_set(a, SkillStatus::Gold);
        skills.extend(full_status_set(b, SkillStatus::Red));

        let distribution = weighted_distribution(&students, &skills);
        assert_eq!(
            distribution,
            StatusCounts {
                red: 1,
                yellow: 0,
                green: 0,
                gold: 1,
            }
        );
    }

    #[test]
    fn student_without_skills_lands_in_red() {
        let class_id = Uuid::new_v4();
        let students = vec![student(Uuid::new_v4(), class_id, "Kiara Patel")];

        let distribution = weighted_distribution(&students, &[]);
        assert_eq!(distribution.red, 1);
        assert_eq!(distribution.total(), 1);
    }

    #[test]
    fn trends_skip_initial_transitions() {
        let milestones = vec![
            milestone(SkillName::Reading, None, SkillStatus::Red, 10),
            milestone(
                SkillName::Reading,
                Some(SkillStatus::Red),
                SkillStatus::Yellow,
                5,
            ),
            milestone(
                SkillName::Reading,
                Some(SkillStatus::Yellow),
                SkillStatus::Red,
                1,
            ),
        ];

        let trends = skill_trends(&milestones, window_cutoff(30));
        assert_eq!(trends.reading.improvements, 1);
        assert_eq!(trends.reading.declines, 1);
        assert_eq!(trends.listening, TrendCounts::default());
    }

    #[test]
    fn trends_ignore_unchanged_status() {
        let milestones = vec![milestone(
            SkillName::Speaking,
            Some(SkillStatus::Green),
            SkillStatus::Green,
            2,
        )];

        let trends = skill_trends(&milestones, window_cutoff(30));
        assert_eq!(trends.speaking, TrendCounts::default());
    }

    #[test]
    fn trends_ignore_milestones_before_cutoff() {
        let milestones = vec![
            milestone(
                SkillName::Writing,
                Some(SkillStatus::Red),
                SkillStatus::Yellow,
                45,
            ),
            milestone(
                SkillName::Writing,
                Some(SkillStatus::Yellow),
                SkillStatus::Green,
                3,
            ),
        ];

        let trends = skill_trends(&milestones, window_cutoff(30));
        assert_eq!(trends.writing.improvements, 1);
        assert_eq!(trends.writing.declines, 0);
    }

    #[test]
    fn cutoff_normalizes_non_positive_windows() {
        let zero = window_cutoff(0);
        let one = window_cutoff(1);
        assert!((zero - one).num_seconds().abs() <= 1);
    }

    #[test]
    fn class_averages_guard_empty_skills() {
        let averages = class_average_scores(&[]);
        for name in SkillName::ALL {
            assert_eq!(*averages.get(name), 0.0);
        }
    }

    #[test]
    fn class_averages_mean_per_skill() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let skills = vec![
            skill(a, SkillName::Listening, SkillStatus::Red),
            skill(b, SkillName::Listening, SkillStatus::Gold),
            skill(a, SkillName::Reading, SkillStatus::Green),
        ];

        let averages = class_average_scores(&skills);
        assert!((averages.listening - 2.5).abs() < 1e-9);
        assert!((averages.reading - 3.0).abs() < 1e-9);
        assert_eq!(averages.speaking, 0.0);
    }

    #[test]
    fn comparison_pairs_student_scores_with_baseline() {
        let a = Uuid::new_v4();
        let skills = vec![skill(a, SkillName::Writing, SkillStatus::Yellow)];
        let mut averages = PerSkill::<f64>::default();
        averages.writing = 3.25;

        let comparison = class_comparison(&skills, &averages);
        assert_eq!(comparison.len(), 1);
        assert_eq!(comparison[0].skill_name, SkillName::Writing);
        assert_eq!(comparison[0].student_score, 2.0);
        assert!((comparison[0].class_average_score - 3.25).abs() < 1e-9);
    }

    #[test]
    fn summary_percentages_sum_to_hundred() {
        let a = Uuid::new_v4();
        let skills = vec![
            skill(a, SkillName::Listening, SkillStatus::Red),
            skill(a, SkillName::Reading, SkillStatus::Yellow),
            skill(a, SkillName::Speaking, SkillStatus::Green),
            skill(a, SkillName::Writing, SkillStatus::Green),
        ];

        let summary = student_status_summary(&skills);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.green.count, 2);
        let sum = summary.red.percentage
            + summary.yellow.percentage
            + summary.green.percentage
            + summary.gold.percentage;
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn summary_of_no_skills_is_all_zero() {
        let summary = student_status_summary(&[]);
        assert_eq!(summary, StudentStatusSummary::default());
        assert_eq!(summary.total, 0);
        assert_eq!(summary.red.percentage, 0.0);
    }

    #[test]
    fn aggregation_is_idempotent_on_a_snapshot() {
        let class_id = Uuid::new_v4();
        let a = Uuid::new_v4();
        let students = vec![student(a, class_id, "Avery Lee")];
        let skills = full_status_set(a, SkillStatus::Yellow);

        assert_eq!(status_breakdown(&skills), status_breakdown(&skills));
        assert_eq!(
            weighted_distribution(&students, &skills),
            weighted_distribution(&students, &skills)
        );
        assert_eq!(class_average_scores(&skills), class_average_scores(&skills));
        assert_eq!(
            student_status_summary(&skills),
            student_status_summary(&skills)
        );
    }
}
