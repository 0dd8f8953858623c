use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

mod analytics;
mod db;
mod models;
mod narrative;
mod report;

use models::{SkillName, SkillStatus};

#[derive(Parser)]
#[command(name = "skill-progress-tracker")]
#[command(about = "Student skill progress tracker and analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Create a class
    CreateClass {
        #[arg(long)]
        name: String,
    },
    /// Enroll a student, creating their four skills at the default status
    AddStudent {
        #[arg(long)]
        class_id: Uuid,
        #[arg(long)]
        name: String,
    },
    /// List a class's students
    ListStudents {
        #[arg(long)]
        class_id: Uuid,
        #[arg(long)]
        include_archived: bool,
    },
    /// Record a skill status change with an auto-generated narrative
    UpdateSkill {
        #[arg(long)]
        student_id: Uuid,
        #[arg(long)]
        skill: SkillName,
        #[arg(long)]
        status: SkillStatus,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        progress: Option<String>,
    },
    /// Move a student to a new class, resetting their skills
    Promote {
        #[arg(long)]
        student_id: Uuid,
        #[arg(long)]
        class_id: Uuid,
    },
    /// Hide a student from default listings
    Archive {
        #[arg(long)]
        student_id: Uuid,
    },
    /// Bring an archived student back
    Restore {
        #[arg(long)]
        student_id: Uuid,
    },
    /// Read-only aggregate summaries
    #[command(subcommand)]
    Analytics(AnalyticsCommands),
    /// Write a class roster CSV with current skill statuses
    ExportCsv {
        #[arg(long)]
        class_id: Uuid,
        #[arg(long, default_value = "roster.csv")]
        out: PathBuf,
    },
    /// Write a markdown progress report for a student
    Report {
        #[arg(long)]
        student_id: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum AnalyticsCommands {
    /// Status counts per skill across a class
    BySkill {
        #[arg(long)]
        class_id: Uuid,
    },
    /// Students per weighted-score category
    Distribution {
        #[arg(long)]
        class_id: Uuid,
    },
    /// Improvements and declines per skill over a trailing window
    Trends {
        #[arg(long)]
        class_id: Uuid,
        #[arg(long, default_value_t = 30)]
        days: i64,
    },
    /// A student's per-skill scores against the class average
    Comparison {
        #[arg(long)]
        student_id: Uuid,
    },
    /// A student's status counts and percentages
    StudentBreakdown {
        #[arg(long)]
        student_id: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::CreateClass { name } => {
            let class = db::create_class(&pool, &name).await?;
            println!("Created class {} ({}).", class.name, class.id);
        }
        Commands::AddStudent { class_id, name } => {
            let class = require_class(&pool, class_id).await?;
            let student = db::create_student(&pool, class.id, &name).await?;
            println!(
                "Enrolled {} ({}) in {} with all skills at {}.",
                student.name,
                student.id,
                class.name,
                SkillStatus::Red
            );
        }
        Commands::ListStudents {
            class_id,
            include_archived,
        } => {
            let class = require_class(&pool, class_id).await?;
            let students = db::fetch_students(&pool, class.id, include_archived).await?;
            if students.is_empty() {
                println!("No students in {}.", class.name);
            } else {
                println!("Students in {}:", class.name);
                for student in &students {
                    let marker = if student.archived { " [archived]" } else { "" };
                    println!(
                        "- {} ({}) enrolled {}{}",
                        student.name, student.id, student.enrollment_date, marker
                    );
                }
            }
        }
        Commands::UpdateSkill {
            student_id,
            skill,
            status,
            comment,
            progress,
        } => {
            let updated = db::update_skill(
                &pool,
                student_id,
                skill,
                status,
                comment.as_deref(),
                progress.as_deref(),
            )
            .await?
            .with_context(|| format!("student or skill not found for {student_id}"))?;
            println!("{} is now {}.", updated.name, updated.current_status);
        }
        Commands::Promote { student_id, class_id } => {
            let class = require_class(&pool, class_id).await?;
            let student = db::promote_student(&pool, student_id, class.id)
                .await?
                .with_context(|| format!("student {student_id} not found"))?;
            println!(
                "Promoted {} to {}; skills reset to {}.",
                student.name,
                class.name,
                SkillStatus::Red
            );
        }
        Commands::Archive { student_id } => {
            let student = db::set_student_archived(&pool, student_id, true)
                .await?
                .with_context(|| format!("student {student_id} not found"))?;
            println!("Archived {}.", student.name);
        }
        Commands::Restore { student_id } => {
            let student = db::set_student_archived(&pool, student_id, false)
                .await?
                .with_context(|| format!("student {student_id} not found"))?;
            println!("Restored {}.", student.name);
        }
        Commands::Analytics(command) => run_analytics(&pool, command).await?,
        Commands::ExportCsv { class_id, out } => {
            let class = require_class(&pool, class_id).await?;
            let students = db::fetch_students(&pool, class.id, false).await?;
            let skills = db::fetch_class_skills(&pool, class.id).await?;
            let csv = report::class_roster_csv(&students, &skills)?;
            std::fs::write(&out, csv)?;
            println!("Roster written to {}.", out.display());
        }
        Commands::Report { student_id, out } => {
            let student = require_student(&pool, student_id).await?;
            let class = require_class(&pool, student.class_id).await?;
            let skills = db::fetch_student_skills(&pool, student.id).await?;
            let summary = analytics::student_status_summary(&skills);
            let milestones = db::fetch_student_milestones(&pool, student.id).await?;
            let report = report::build_student_report(&student, &class.name, &summary, &milestones);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn run_analytics(pool: &PgPool, command: AnalyticsCommands) -> anyhow::Result<()> {
    match command {
        AnalyticsCommands::BySkill { class_id } => {
            let class = require_class(pool, class_id).await?;
            let skills = db::fetch_class_skills(pool, class.id).await?;
            print_json(&analytics::status_breakdown(&skills))?;
        }
        AnalyticsCommands::Distribution { class_id } => {
            let class = require_class(pool, class_id).await?;
            let students = db::fetch_students(pool, class.id, false).await?;
            let skills = db::fetch_class_skills(pool, class.id).await?;
            print_json(&analytics::weighted_distribution(&students, &skills))?;
        }
        AnalyticsCommands::Trends { class_id, days } => {
            let class = require_class(pool, class_id).await?;
            let cutoff = analytics::window_cutoff(days);
            let milestones = db::fetch_class_milestones(pool, class.id, cutoff).await?;
            print_json(&analytics::skill_trends(&milestones, cutoff))?;
        }
        AnalyticsCommands::Comparison { student_id } => {
            let student = require_student(pool, student_id).await?;
            let class_skills = db::fetch_class_skills(pool, student.class_id).await?;
            let averages = analytics::class_average_scores(&class_skills);
            let student_skills = db::fetch_student_skills(pool, student.id).await?;
            print_json(&analytics::class_comparison(&student_skills, &averages))?;
        }
        AnalyticsCommands::StudentBreakdown { student_id } => {
            let student = require_student(pool, student_id).await?;
            let skills = db::fetch_student_skills(pool, student.id).await?;
            print_json(&analytics::student_status_summary(&skills))?;
        }
    }

    Ok(())
}

async fn require_class(pool: &PgPool, class_id: Uuid) -> anyhow::Result<models::ClassRecord> {
    db::fetch_class(pool, class_id)
        .await?
        .with_context(|| format!("class {class_id} not found"))
}

async fn require_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<models::StudentRecord> {
    db::fetch_student(pool, student_id)
        .await?
        .with_context(|| format!("student {student_id} not found"))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
