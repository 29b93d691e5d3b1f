use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use learn_core::completion::StageStatus;
use learn_core::demo::demo_course;
use learn_core::dashboard::{LearnerStats, LessonAggregate};
use learn_core::model::{AnswerId, CourseId, LearnerId, LessonId, Rating};
use learn_core::quiz::QuizSession;
use services::api::wire::parse_course;
use services::config::thresholds_from_env;
use services::{
    ApiConfig, AppServices, Clock, CourseDashboards, CourseProgressionController, CourseView,
    GraderConfig, LessonView, ProgressionError, QuizAdvance, SessionHandle,
};

mod cli;
mod telemetry;

use cli::{Cli, Command};

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_owned();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// sqlx refuses to open a missing file without `mode=rwc`, so create it.
fn prepare_sqlite_file(db_url: &str) -> anyhow::Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }
    let path = db_url
        .strip_prefix("sqlite://")
        .with_context(|| format!("invalid --db value: {db_url}"))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("invalid --db value: {db_url}");
    }
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    if !path.exists() {
        std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    }
    Ok(())
}

async fn build_services(cli: &Cli) -> anyhow::Result<AppServices> {
    let api = ApiConfig::from_env()?;
    let grader = GraderConfig::from_env()?;
    let thresholds = thresholds_from_env()?;
    let clock = Clock::default();

    let services = if cli.remote {
        AppServices::new_remote(&api, &grader, SessionHandle::new(), clock, thresholds)?
    } else {
        let db_url = normalize_sqlite_url(&cli.db);
        prepare_sqlite_file(&db_url)?;
        tracing::debug!(%db_url, "using local database");
        AppServices::new_sqlite(&db_url, &api, &grader, clock, thresholds).await?
    };

    // Local progress works offline; only grading and remote mode need a login.
    match (&cli.username, &cli.password, services.auth()) {
        (Some(username), Some(password), Some(auth)) => {
            let session = auth
                .login(username, password)
                .await
                .context("login failed")?;
            tracing::info!(user = %session.username, "signed in");
        }
        _ if cli.remote => {
            bail!("--remote needs --username and --password (or LEARN_USERNAME / LEARN_PASSWORD)");
        }
        _ => {}
    }
    Ok(services)
}

fn check_course(path: &Path) -> anyhow::Result<()> {
    let body = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let remote = parse_course(&body)?;
    if let Some(state) = remote.creator_state {
        println!("wizard step: {state}");
        if state.next() != state {
            println!("next step: {}", state.next());
        }
    }
    match remote.course.check_publishable() {
        Ok(()) => {
            println!("ready to publish");
            Ok(())
        }
        Err(err) => bail!("not publishable: {err}"),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Check { path } = &cli.command {
        return check_course(path);
    }

    let services = build_services(&cli).await?;
    let controller = services.controller();
    let dashboards: Arc<dyn CourseDashboards> = services.dashboards();
    let clock = Clock::default();
    let learner = LearnerId::new(cli.learner);

    match cli.command {
        Command::Seed => {
            ensure_local(cli.remote)?;
            let course = demo_course();
            services
                .storage()
                .courses
                .upsert_course(&course, clock.now())
                .await?;
            println!("seeded course {} \"{}\"", course.id(), course.name());
        }
        Command::Import { ref path } => {
            ensure_local(cli.remote)?;
            let body = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            let remote = parse_course(&body)?;
            services
                .storage()
                .courses
                .upsert_course(&remote.course, clock.now())
                .await?;
            println!(
                "imported course {} \"{}\"",
                remote.course.id(),
                remote.course.name()
            );
        }
        Command::Check { ref path } => check_course(path)?,
        Command::Enroll { course } => {
            let view = controller.enroll(learner, CourseId::new(course)).await?;
            print_course(&view);
        }
        Command::Status { course } => {
            let course_id = CourseId::new(course);
            let view = controller.course_view(learner, course_id).await?;
            print_course(&view);
            println!("rating: {}", controller.course_rating(course_id).await?);
        }
        Command::Intro { course, lesson } => {
            let course_id = CourseId::new(course);
            let lesson_id = LessonId::new(lesson);
            let view = controller.open_lesson(learner, course_id, lesson_id).await?;
            let text = services
                .storage()
                .courses
                .get_course(course_id)
                .await?
                .lesson(lesson_id)
                .and_then(|l| l.introduction().map(str::to_owned));
            match text {
                Some(text) => {
                    println!("{}\n\n{text}\n", view.topic);
                    let view = controller
                        .view_introduction(learner, course_id, lesson_id)
                        .await?;
                    print_lesson(&view);
                }
                None => print_lesson(&view),
            }
        }
        Command::Quiz { course, lesson } => {
            let course_id = CourseId::new(course);
            let mut session = controller
                .start_quiz(learner, course_id, LessonId::new(lesson))
                .await?;
            run_quiz(&controller, learner, course_id, &mut session).await?;
        }
        Command::Assignment {
            course,
            lesson,
            ref file,
        } => {
            let code = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let outcome = controller
                .submit_assignment(learner, CourseId::new(course), LessonId::new(lesson), &code)
                .await?;
            println!(
                "score {} ({:?}), best {}",
                outcome.evaluation.assignment_score,
                outcome.tier,
                score_text(outcome.best_score)
            );
            println!("{}", outcome.evaluation.message);
            print_lesson(&outcome.lesson);
            if let Some(next) = outcome.next_lesson {
                println!("next lesson: {next}");
            }
        }
        Command::Stats { course } => {
            let stats = controller.course_stats(learner, CourseId::new(course)).await?;
            println!(
                "lessons      {}/{} ({}%)",
                stats.completed_lessons,
                stats.lesson_count,
                stats.completion_percentage()
            );
            println!(
                "quizzes      {} started, {}% average",
                stats.started_quizzes, stats.quiz_score_percentage
            );
            println!(
                "assignments  {} started, {}% average",
                stats.started_assignments, stats.assignment_score_percentage
            );
        }
        Command::Rate { course, score } => {
            let summary = controller
                .rate_course(learner, CourseId::new(course), Rating::new(score)?)
                .await?;
            println!("rated {score}/5, course rating {summary}");
        }
        Command::Leaderboard { course, sort } => {
            let rows = dashboards
                .leaderboard(CourseId::new(course), sort.into())
                .await?;
            if rows.is_empty() {
                println!("nobody is enrolled yet");
            }
            for (rank, row) in rows.iter().enumerate() {
                println!("{}", leaderboard_line(rank + 1, row));
            }
        }
        Command::Lessons { course } => {
            let lessons = dashboards
                .lesson_aggregates(CourseId::new(course))
                .await?;
            for lesson in &lessons {
                println!("{}", aggregate_line(lesson));
            }
        }
        Command::Overview { ref courses } => {
            let ids: Vec<CourseId> = courses.iter().copied().map(CourseId::new).collect();
            let overview = dashboards.overview(&ids).await?;
            println!("courses            {}", overview.courses_count);
            println!("students           {}", overview.students_count);
            println!("completed lessons  {}", overview.completed_lessons);
        }
    }
    Ok(())
}

fn leaderboard_line(rank: usize, row: &LearnerStats) -> String {
    let stats = &row.stats;
    format!(
        "{rank:>3}. {:<16} {}/{} lessons  quiz {}%  assignment {}%",
        row.learner.to_string(),
        stats.completed_lessons,
        stats.lesson_count,
        stats.quiz_score_percentage,
        stats.assignment_score_percentage,
    )
}

fn aggregate_line(lesson: &LessonAggregate) -> String {
    format!(
        "{:>4}  {:<24} {}/{} done ({}%)  quiz {}%  assignment {}%",
        lesson.lesson_id,
        lesson.topic,
        lesson.completed_count,
        lesson.learner_count,
        lesson.completion_percentage(),
        lesson.quiz_score_percentage,
        lesson.assignment_score_percentage,
    )
}

fn ensure_local(remote: bool) -> anyhow::Result<()> {
    if remote {
        bail!("this command only works against the local database");
    }
    Ok(())
}

async fn run_quiz(
    controller: &CourseProgressionController,
    learner: LearnerId,
    course_id: CourseId,
    session: &mut QuizSession,
) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let Some(question) = session.current_question() else {
            bail!("quiz is not in progress");
        };
        let index = session.current_index().unwrap_or_default();
        println!(
            "\n[{}/{}] {}",
            index + 1,
            session.question_count(),
            question.prompt()
        );
        let answers: Vec<AnswerId> = question.answers().iter().map(|a| a.id).collect();
        for (n, answer) in question.answers().iter().enumerate() {
            println!("  {}) {}", n + 1, answer.text);
        }

        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            bail!("quiz abandoned");
        };
        let choice = line?
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|n| answers.get(n).copied());
        let Some(answer) = choice else {
            println!("pick a number between 1 and {}", answers.len());
            continue;
        };
        session.select_answer(answer)?;

        match controller.advance_quiz(learner, course_id, session).await? {
            QuizAdvance::Next { .. } => {}
            QuizAdvance::Completed {
                result,
                best_score,
                lesson,
            } => {
                println!(
                    "\n{}/{} correct: {} (best {})",
                    result.correct,
                    result.total,
                    result.score,
                    score_text(best_score)
                );
                print_lesson(&lesson);
                return Ok(());
            }
        }
    }
}

fn score_text(score: Option<learn_core::model::Score>) -> String {
    score.map_or_else(|| "-".to_owned(), |s| s.to_string())
}

fn stage_text(stages: &[StageStatus]) -> String {
    stages
        .iter()
        .map(|s| format!("{}{}", s.stage, if s.passed { " ✓" } else { "" }))
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_lesson(view: &LessonView) {
    let marker = if view.lesson_completed {
        "done"
    } else if view.unlocked {
        "open"
    } else {
        "locked"
    };
    println!(
        "{:>4}  {:<6} {}  [{}] quiz {} assignment {}",
        view.lesson_id,
        marker,
        view.topic,
        stage_text(&view.stages),
        score_text(view.quiz_best_score),
        score_text(view.assignment_best_score),
    );
}

fn print_course(view: &CourseView) {
    println!("{} (course {})", view.name, view.course_id);
    if !view.enrolled {
        println!("not enrolled");
    }
    for lesson in &view.lessons {
        print_lesson(lesson);
    }
    if view.completed {
        println!("course completed");
    } else if let Some(current) = view.current_lesson {
        println!("continue with lesson {current}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(telemetry::filter_for_verbosity(cli.verbose));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(progression) = err.downcast_ref::<ProgressionError>() {
                tracing::debug!(kind = ?progression.kind(), "command failed");
                if progression.is_unauthenticated() {
                    eprintln!("session expired, log in again");
                }
            }
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_urls_are_made_absolute() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            normalize_sqlite_url("sqlite:///tmp/learn.db"),
            "sqlite:///tmp/learn.db"
        );
        assert_eq!(normalize_sqlite_url("/tmp/learn.db"), "sqlite:///tmp/learn.db");
        assert!(normalize_sqlite_url("sqlite:dev.sqlite3").ends_with("/dev.sqlite3"));
    }

    #[test]
    fn dashboard_lines_name_the_learner_and_lesson() {
        use learn_core::dashboard::LearnerRef;
        use learn_core::stats::CourseStats;

        let row = LearnerStats {
            learner: LearnerRef::Username("ada".into()),
            stats: CourseStats {
                lesson_count: 3,
                completed_lessons: 2,
                quiz_score_percentage: 80,
                assignment_score_percentage: 45,
                ..CourseStats::default()
            },
        };
        let line = leaderboard_line(1, &row);
        assert!(line.starts_with("  1. ada"));
        assert!(line.ends_with("2/3 lessons  quiz 80%  assignment 45%"));

        let lesson = LessonAggregate {
            lesson_id: LessonId::new(4),
            topic: "Borrowing".into(),
            learner_count: 4,
            completed_count: 1,
            quiz_score_percentage: 50,
            assignment_score_percentage: 0,
        };
        assert!(aggregate_line(&lesson).contains("1/4 done (25%)"));
    }

    #[test]
    fn score_text_uses_dash_for_missing() {
        assert_eq!(score_text(None), "-");
        assert_eq!(
            score_text(Some(learn_core::model::Score::new(67).unwrap())),
            "67%"
        );
    }
}
