use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    ClassRecord, MilestoneRecord, SkillName, SkillRecord, SkillStatus, StudentRecord,
};
use crate::narrative;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let classes = vec![
        (
            Uuid::parse_str("7f3e1c5a-94b2-4f0d-8a6e-2d9b61c47e01")?,
            "Beginners A",
        ),
        (
            Uuid::parse_str("b8d24a7c-1e5f-4c3b-9d07-54a8f2e6b902")?,
            "Intermediate B",
        ),
    ];

    for (id, name) in classes.iter().copied() {
        sqlx::query(
            r#"
            INSERT INTO skill_tracker.classes (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "Avery Lee",
            classes[0].0,
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "Jules Moreno",
            classes[0].0,
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "Kiara Patel",
            classes[1].0,
        ),
    ];

    for (id, name, class_id) in students.iter().copied() {
        sqlx::query(
            r#"
            INSERT INTO skill_tracker.students (id, name, class_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, class_id = EXCLUDED.class_id
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(class_id)
        .execute(pool)
        .await?;

        for skill_name in SkillName::ALL {
            sqlx::query(
                r#"
                INSERT INTO skill_tracker.skills (id, student_id, name)
                VALUES ($1, $2, $3)
                ON CONFLICT (student_id, name) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(skill_name)
            .execute(pool)
            .await?;
        }
    }

    let milestones = vec![
        (
            "seed-001",
            students[0].0,
            students[0].1,
            SkillName::Reading,
            None,
            SkillStatus::Yellow,
            Some("picture book"),
        ),
        (
            "seed-002",
            students[0].0,
            students[0].1,
            SkillName::Reading,
            Some(SkillStatus::Yellow),
            SkillStatus::Green,
            Some("short story"),
        ),
        (
            "seed-003",
            students[1].0,
            students[1].1,
            SkillName::Speaking,
            None,
            SkillStatus::Yellow,
            None,
        ),
        (
            "seed-004",
            students[2].0,
            students[2].1,
            SkillName::Writing,
            None,
            SkillStatus::Yellow,
            None,
        ),
        (
            "seed-005",
            students[2].0,
            students[2].1,
            SkillName::Writing,
            Some(SkillStatus::Yellow),
            SkillStatus::Red,
            None,
        ),
    ];

    for (source_key, student_id, student_name, skill_name, previous, new_status, progress) in
        milestones
    {
        let inserted = sqlx::query(
            r#"
            INSERT INTO skill_tracker.milestones
            (student_id, skill_name, previous_status, new_status, progress_value,
             narrative, source_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(student_id)
        .bind(skill_name)
        .bind(previous)
        .bind(new_status)
        .bind(progress)
        .bind(narrative::generate(student_name, skill_name, new_status, progress))
        .bind(source_key)
        .execute(pool)
        .await?;

        if inserted.rows_affected() > 0 {
            sqlx::query(
                r#"
                UPDATE skill_tracker.skills
                SET current_status = $1, last_updated = now()
                WHERE student_id = $2 AND name = $3
                "#,
            )
            .bind(new_status)
            .bind(student_id)
            .bind(skill_name)
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}

pub async fn create_class(pool: &PgPool, name: &str) -> anyhow::Result<ClassRecord> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO skill_tracker.classes (id, name) VALUES ($1, $2)",
    )
    .bind(id)
    .bind(name)
    .execute(pool)
    .await
    .with_context(|| format!("failed to create class {name}"))?;

    Ok(ClassRecord {
        id,
        name: name.to_string(),
    })
}

pub async fn fetch_class(pool: &PgPool, class_id: Uuid) -> anyhow::Result<Option<ClassRecord>> {
    let row = sqlx::query("SELECT id, name FROM skill_tracker.classes WHERE id = $1")
        .bind(class_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| ClassRecord {
        id: row.get("id"),
        name: row.get("name"),
    }))
}

fn student_from_row(row: &sqlx::postgres::PgRow) -> StudentRecord {
    StudentRecord {
        id: row.get("id"),
        name: row.get("name"),
        class_id: row.get("class_id"),
        enrollment_date: row.get("enrollment_date"),
        archived: row.get("archived"),
    }
}

pub async fn fetch_student(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Option<StudentRecord>> {
    let row = sqlx::query(
        "SELECT id, name, class_id, enrollment_date, archived \
         FROM skill_tracker.students WHERE id = $1",
    )
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| student_from_row(&row)))
}

pub async fn fetch_students(
    pool: &PgPool,
    class_id: Uuid,
    include_archived: bool,
) -> anyhow::Result<Vec<StudentRecord>> {
    let mut query = String::from(
        "SELECT id, name, class_id, enrollment_date, archived \
         FROM skill_tracker.students WHERE class_id = $1",
    );
    if !include_archived {
        query.push_str(" AND NOT archived");
    }
    query.push_str(" ORDER BY name");

    let rows = sqlx::query(&query).bind(class_id).fetch_all(pool).await?;
    Ok(rows.iter().map(student_from_row).collect())
}

/// Inserts the student and their four skills at the default status in one
/// transaction, so no student ever exists with a partial skill set.
pub async fn create_student(
    pool: &PgPool,
    class_id: Uuid,
    name: &str,
) -> anyhow::Result<StudentRecord> {
    let mut tx = pool.begin().await?;

    let id = Uuid::new_v4();
    let row = sqlx::query(
        r#"
        INSERT INTO skill_tracker.students (id, name, class_id)
        VALUES ($1, $2, $3)
        RETURNING id, name, class_id, enrollment_date, archived
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(class_id)
    .fetch_one(&mut *tx)
    .await
    .with_context(|| format!("failed to create student {name}"))?;

    for skill_name in SkillName::ALL {
        sqlx::query(
            "INSERT INTO skill_tracker.skills (id, student_id, name) VALUES ($1, $2, $3)",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(skill_name)
        .execute(&mut *tx)
        .await?;
    }

    let student = student_from_row(&row);
    tx.commit().await?;
    Ok(student)
}

fn skill_from_row(row: &sqlx::postgres::PgRow) -> SkillRecord {
    SkillRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        name: row.get("name"),
        current_status: row.get("current_status"),
        last_updated: row.get("last_updated"),
    }
}

pub async fn fetch_student_skills(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<SkillRecord>> {
    let rows = sqlx::query(
        "SELECT id, student_id, name, current_status, last_updated \
         FROM skill_tracker.skills WHERE student_id = $1 ORDER BY name",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(skill_from_row).collect())
}

/// Current skills of a class's non-archived students.
pub async fn fetch_class_skills(
    pool: &PgPool,
    class_id: Uuid,
) -> anyhow::Result<Vec<SkillRecord>> {
    let rows = sqlx::query(
        "SELECT sk.id, sk.student_id, sk.name, sk.current_status, sk.last_updated \
         FROM skill_tracker.skills sk \
         JOIN skill_tracker.students st ON st.id = sk.student_id \
         WHERE st.class_id = $1 AND NOT st.archived",
    )
    .bind(class_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(skill_from_row).collect())
}

fn milestone_from_row(row: &sqlx::postgres::PgRow) -> MilestoneRecord {
    MilestoneRecord {
        id: row.get("id"),
        student_id: row.get("student_id"),
        skill_name: row.get("skill_name"),
        previous_status: row.get("previous_status"),
        new_status: row.get("new_status"),
        comment: row.get("comment"),
        progress_value: row.get("progress_value"),
        narrative: row.get("narrative"),
        recorded_at: row.get("recorded_at"),
    }
}

/// Milestones of a class's non-archived students recorded at or after `since`.
pub async fn fetch_class_milestones(
    pool: &PgPool,
    class_id: Uuid,
    since: DateTime<Utc>,
) -> anyhow::Result<Vec<MilestoneRecord>> {
    let rows = sqlx::query(
        "SELECT m.id, m.student_id, m.skill_name, m.previous_status, m.new_status, \
                m.comment, m.progress_value, m.narrative, m.recorded_at \
         FROM skill_tracker.milestones m \
         JOIN skill_tracker.students st ON st.id = m.student_id \
         WHERE st.class_id = $1 AND NOT st.archived AND m.recorded_at >= $2 \
         ORDER BY m.recorded_at, m.id",
    )
    .bind(class_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(milestone_from_row).collect())
}

pub async fn fetch_student_milestones(
    pool: &PgPool,
    student_id: Uuid,
) -> anyhow::Result<Vec<MilestoneRecord>> {
    let rows = sqlx::query(
        "SELECT id, student_id, skill_name, previous_status, new_status, \
                comment, progress_value, narrative, recorded_at \
         FROM skill_tracker.milestones WHERE student_id = $1 \
         ORDER BY recorded_at DESC, id DESC",
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(milestone_from_row).collect())
}

/// Appends a milestone for the transition and overwrites the skill's current
/// status, in one transaction. Returns `None` when the student or the skill
/// row does not exist.
pub async fn update_skill(
    pool: &PgPool,
    student_id: Uuid,
    skill_name: SkillName,
    new_status: SkillStatus,
    comment: Option<&str>,
    progress_value: Option<&str>,
) -> anyhow::Result<Option<SkillRecord>> {
    let Some(student) = fetch_student(pool, student_id).await? else {
        return Ok(None);
    };

    let mut tx = pool.begin().await?;

    let Some(row) = sqlx::query(
        "SELECT id, student_id, name, current_status, last_updated \
         FROM skill_tracker.skills WHERE student_id = $1 AND name = $2 FOR UPDATE",
    )
    .bind(student_id)
    .bind(skill_name)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Ok(None);
    };
    let skill = skill_from_row(&row);

    // The first milestone for a skill records initialization, not a change;
    // it carries no previous status and never counts toward trends.
    let has_history: bool = sqlx::query(
        "SELECT EXISTS ( \
             SELECT 1 FROM skill_tracker.milestones \
             WHERE student_id = $1 AND skill_name = $2 \
         ) AS has_history",
    )
    .bind(student_id)
    .bind(skill_name)
    .fetch_one(&mut *tx)
    .await?
    .get("has_history");
    let previous_status = has_history.then_some(skill.current_status);

    let narrative = narrative::generate(&student.name, skill_name, new_status, progress_value);

    sqlx::query(
        r#"
        INSERT INTO skill_tracker.milestones
        (student_id, skill_name, previous_status, new_status, comment,
         progress_value, narrative)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(student_id)
    .bind(skill_name)
    .bind(previous_status)
    .bind(new_status)
    .bind(comment)
    .bind(progress_value)
    .bind(&narrative)
    .execute(&mut *tx)
    .await?;

    let row = sqlx::query(
        r#"
        UPDATE skill_tracker.skills
        SET current_status = $1, last_updated = now()
        WHERE id = $2
        RETURNING id, student_id, name, current_status, last_updated
        "#,
    )
    .bind(new_status)
    .bind(skill.id)
    .fetch_one(&mut *tx)
    .await?;

    let updated = skill_from_row(&row);
    tx.commit().await?;
    Ok(Some(updated))
}

/// Moves the student to a new class and resets all skills to the default
/// status. The reset is a direct overwrite; no milestones are written.
pub async fn promote_student(
    pool: &PgPool,
    student_id: Uuid,
    new_class_id: Uuid,
) -> anyhow::Result<Option<StudentRecord>> {
    let mut tx = pool.begin().await?;

    let Some(row) = sqlx::query(
        r#"
        UPDATE skill_tracker.students
        SET class_id = $1
        WHERE id = $2
        RETURNING id, name, class_id, enrollment_date, archived
        "#,
    )
    .bind(new_class_id)
    .bind(student_id)
    .fetch_optional(&mut *tx)
    .await?
    else {
        return Ok(None);
    };

    sqlx::query(
        r#"
        UPDATE skill_tracker.skills
        SET current_status = $1, last_updated = now()
        WHERE student_id = $2
        "#,
    )
    .bind(SkillStatus::Red)
    .bind(student_id)
    .execute(&mut *tx)
    .await?;

    let student = student_from_row(&row);
    tx.commit().await?;
    Ok(Some(student))
}

pub async fn set_student_archived(
    pool: &PgPool,
    student_id: Uuid,
    archived: bool,
) -> anyhow::Result<Option<StudentRecord>> {
    let row = sqlx::query(
        r#"
        UPDATE skill_tracker.students
        SET archived = $1
        WHERE id = $2
        RETURNING id, name, class_id, enrollment_date, archived
        "#,
    )
    .bind(archived)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| student_from_row(&row)))
}
