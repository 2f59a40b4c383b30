use std::fmt;

use assess_core::model::{
    AccordionItem, AnswerOption, AnswerValue, AreaId, ControlQuestion, LearnerCode, LearnerRecord,
    LearningArea, Module, ModuleId, ModuleKind, Question, QuestionKind, ShuffledModule,
};
use services::{
    Aggregator, Autosaver, Clock, ModuleSession, ProgressService, SessionError,
    StatisticsService, SubmissionService,
};
use storage::repository::{Storage, StorageError};
use url::Url;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidLearnerCode { raw: String },
    InvalidModuleId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidLearnerCode { raw } => write!(f, "invalid --learner value: {raw}"),
            ArgsError::InvalidModuleId { raw } => write!(f, "invalid --module value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- seed  [--db <sqlite_url>] [--learner <code>]");
    eprintln!("  cargo run -p app -- stats [--db <sqlite_url>] [--module <id>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://assess.sqlite3");
    eprintln!("  --learner DEMO-1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_DB_URL, ASSESS_LEARNER");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Seed,
    Stats,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "seed" => Some(Self::Seed),
            "stats" => Some(Self::Stats),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    learner: LearnerCode,
    module: Option<ModuleId>,
}

impl Args {
    fn parse_seed(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        Self::parse(args, false)
    }

    fn parse_stats(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        Self::parse(args, true)
    }

    fn parse(
        args: &mut impl Iterator<Item = String>,
        allow_module: bool,
    ) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ASSESS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://assess.sqlite3".into(), |raw| normalize_sqlite_url(&raw));
        let mut learner = std::env::var("ASSESS_LEARNER")
            .ok()
            .and_then(|value| LearnerCode::new(value).ok());
        let mut module = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(&value);
                }
                "--learner" => {
                    let value = require_value(args, "--learner")?;
                    learner = Some(
                        LearnerCode::new(&value)
                            .map_err(|_| ArgsError::InvalidLearnerCode { raw: value })?,
                    );
                }
                "--module" if allow_module => {
                    let value = require_value(args, "--module")?;
                    module = Some(
                        ModuleId::new(&value)
                            .map_err(|_| ArgsError::InvalidModuleId { raw: value })?,
                    );
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let learner = match learner {
            Some(learner) => learner,
            // the default cannot fail validation
            None => LearnerCode::new("DEMO-1").map_err(|_| ArgsError::InvalidLearnerCode {
                raw: "DEMO-1".into(),
            })?,
        };
        Ok(Self {
            db_url,
            learner,
            module,
        })
    }
}

fn normalize_sqlite_url(raw: &str) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw.to_owned();
    }

    let trimmed = raw.trim();
    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    argv.remove(0);

    let mut iter = argv.into_iter();
    let parsed = match cmd {
        Command::Seed => Args::parse_seed(&mut iter),
        Command::Stats => Args::parse_stats(&mut iter),
    }
    .map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup so core/services stay free of setup
    // concerns.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    let area = demo_area()?;

    match cmd {
        Command::Seed => seed(&storage, &area, &parsed.learner).await,
        Command::Stats => stats(&storage, &area, parsed.module.as_ref()).await,
    }
}

// ─── SEED ──────────────────────────────────────────────────────────────────────

async fn seed(
    storage: &Storage,
    area: &LearningArea,
    learner: &LearnerCode,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Clock::system();
    let record = LearnerRecord::new(learner.clone(), "Demo Learner", clock.now())?;
    match storage.learners.create_learner(&record).await {
        Ok(()) => tracing::info!("registered learner {}", learner),
        Err(StorageError::Conflict) => {
            tracing::info!("learner {} already registered, reusing", learner);
        }
        Err(e) => return Err(e.into()),
    }

    let submission = SubmissionService::new(
        clock,
        storage.learners.clone(),
        storage.progress.clone(),
        storage.badges.clone(),
        storage.events.clone(),
    );
    for (i, module) in area.modules().iter().enumerate() {
        // alternate strong and weak runs so the stats have some shape
        let well = i % 2 == 0;
        let score = complete_module(storage, &submission, &clock, area, module, learner, well)
            .await?;
        println!("{:<24} {:>3} points", module.id().to_string(), score);
    }

    let progress = ProgressService::new(clock, storage.progress.clone(), storage.feedback.clone());
    let first_module = area.modules()[0].id().clone();
    let filed = progress
        .submit_overall_feedback(learner, area.id(), 4, first_module, 5)
        .await?;
    if !filed {
        tracing::info!("overall feedback for {} already filed", area.id());
    }

    let standing = progress.area_progress(learner, area).await?;
    println!(
        "{}: {}/{} modules, {} of {} points ({}%), certificate: {}",
        area.id(),
        standing.completed(),
        standing.total(),
        standing.points(),
        standing.max_points(),
        standing.percent(),
        if standing.certificate_eligible() { "earned" } else { "not yet" },
    );
    Ok(())
}

/// Walks one module end to end: mark started, answer everything, autosave
/// along the way, then submit. A module the learner already completed is
/// left untouched.
async fn complete_module(
    storage: &Storage,
    submission: &SubmissionService,
    clock: &Clock,
    area: &LearningArea,
    module: &Module,
    learner: &LearnerCode,
    well: bool,
) -> Result<u32, Box<dyn std::error::Error>> {
    submission.mark_started(learner, module.id()).await?;

    let stored = storage.progress.module_progress(learner, module.id()).await?;
    if let Some(stored) = &stored {
        if stored.is_completed() {
            return Ok(stored.score());
        }
    }
    let mut session = ModuleSession::begin(module, stored.as_ref())?;

    let saver = Autosaver::spawn(
        storage.progress.clone(),
        learner.clone(),
        module.id().clone(),
    );

    let picks: Vec<(u32, AnswerValue)> = session
        .module()
        .questions()
        .iter()
        .filter(|q| q.kind().is_answerable() && q.kind() != QuestionKind::SurveyResults)
        .map(|q| (q.ordinal(), choose_selection(q, well)))
        .collect();
    for (ordinal, value) in picks {
        let patch = session.record_answer(ordinal, value, clock.now())?;
        saver.save_debounced(patch).await;
    }

    let control_picks: Vec<(String, AnswerValue)> = session
        .module()
        .accordion()
        .iter()
        .filter_map(|item| {
            item.control()
                .map(|control| (item.id().to_owned(), choose_control(control, well)))
        })
        .collect();
    for (id, value) in control_picks {
        let patch = session.record_accordion_answer(&id, value, clock.now())?;
        saver.save_debounced(patch).await;
    }

    if let Some(patch) = session.mark_results_viewed(clock.now())? {
        saver.save_now(patch).await;
    }

    saver.flush().await;
    saver.close().await;

    loop {
        match session.advance() {
            Ok(_) => {}
            Err(SessionError::SubmitRequired) => break,
            Err(e) => return Err(e.into()),
        }
    }
    let score = submission.submit(&mut session, learner, area).await?;
    Ok(score)
}

/// Picks a selection for one question: the correct options on a strong run,
/// plausible wrong ones otherwise. Questions without marked answers (the
/// feedback kinds) just take the first option.
fn choose_selection(question: &Question, well: bool) -> AnswerValue {
    if question.is_multi_select() {
        let positions: Vec<u32> = question
            .options()
            .iter()
            .enumerate()
            .filter(|(_, option)| option.is_correct() == well)
            .map(|(i, _)| i as u32)
            .collect();
        if positions.is_empty() {
            AnswerValue::MultiIndex(vec![0])
        } else {
            AnswerValue::MultiIndex(positions)
        }
    } else {
        let position = question
            .options()
            .iter()
            .position(|option| option.is_correct() == well)
            .unwrap_or(0) as u32;
        AnswerValue::SingleIndex(position)
    }
}

fn choose_control(control: &ControlQuestion, well: bool) -> AnswerValue {
    let position = control
        .options()
        .iter()
        .position(|option| option.is_correct() == well)
        .unwrap_or(0) as u32;
    AnswerValue::SingleIndex(position)
}

// ─── STATS ─────────────────────────────────────────────────────────────────────

async fn stats(
    storage: &Storage,
    area: &LearningArea,
    only: Option<&ModuleId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let aggregator = Aggregator::new(storage.events.clone());
    let mut matched = false;
    for module in area.modules() {
        if only.is_some_and(|id| id != module.id()) {
            continue;
        }
        matched = true;
        let layout = ShuffledModule::unshuffled(module);
        let distributions = aggregator.module_distributions(&layout).await?;
        println!("{}: {}", module.id(), module.title());
        for question in distributions {
            println!(
                "  [{}] {} ({} respondents, {} selections)",
                question.ordinal, question.prompt, question.respondents, question.total_selections,
            );
            for option in question.options {
                println!("    {:>3}% {:>4}  {}", option.percent, option.count, option.text);
            }
        }
        println!();
    }
    if let Some(id) = only {
        if !matched {
            println!("module {id} is not part of the demo area");
            println!();
        }
    }

    let statistics = StatisticsService::new(
        storage.learners.clone(),
        storage.badges.clone(),
        storage.feedback.clone(),
    );
    let summary = statistics.platform_summary().await?;
    println!(
        "learners: {}  badges: {}  certificate-eligible: {}",
        summary.learners, summary.badges_issued, summary.certificate_eligible,
    );

    let feedback = statistics.area_feedback_stats(area.id()).await?;
    if feedback.respondents == 0 {
        println!("no overall feedback filed yet");
    } else {
        println!(
            "feedback: {} respondents, avg {} points, satisfaction {:.1}, recommend {}%",
            feedback.respondents,
            feedback.average_points,
            feedback.average_satisfaction,
            feedback.recommend_rate,
        );
        if let Some(favorite) = feedback.favorite_module {
            println!("favorite module: {favorite}");
        }
    }
    Ok(())
}

// ─── DEMO CATALOG ──────────────────────────────────────────────────────────────

/// A small fixed area covering every module kind, used by `seed` and `stats`.
fn demo_area() -> Result<LearningArea, Box<dyn std::error::Error>> {
    let hygiene = Module::new(
        ModuleId::new("hand-hygiene")?,
        "Hand Hygiene",
        ModuleKind::Knowledge,
        100,
        vec![
            Question::new(
                0,
                "When should hands be washed?",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Before handling food", true)
                        .with_feedback("Washing before food handling stops most transmission."),
                    AnswerOption::new("Only when visibly dirty", false),
                    AnswerOption::new("Once a day is enough", false),
                ],
            )?,
            Question::new(
                1,
                "Which practices curb infection? Pick all that apply.",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Washing hands regularly", true),
                    AnswerOption::new("Covering coughs", true),
                    AnswerOption::new("Sharing drinking cups", false),
                ],
            )?
            .with_multi_select(true),
            Question::new(
                2,
                "How long should scrubbing take?",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("About twenty seconds", true),
                    AnswerOption::new("Two or three seconds", false),
                    AnswerOption::new("At least five minutes", false),
                ],
            )?,
        ],
        vec![
            AccordionItem::new(
                "soap-types",
                "Does the soap matter?",
                "Plain soap removes microbes mechanically; antibacterial labels add little.",
            )?
            .with_control(ControlQuestion::new(
                "What matters most when washing?",
                vec![
                    AnswerOption::new("Technique and duration", true),
                    AnswerOption::new("Using antibacterial soap", false),
                ],
            )?),
        ],
    )?
    .with_intro_video(Url::parse("https://videos.example.com/hand-hygiene-intro")?);

    let terms = Module::new(
        ModuleId::new("safety-terms")?,
        "Safety Terminology",
        ModuleKind::Terminology {
            pinned_prefix: 2,
            knowledge_check_size: 2,
        },
        100,
        vec![
            Question::new(
                0,
                "What is a contaminant?",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("An unwanted substance that causes harm", true),
                    AnswerOption::new("Any cleaning agent", false),
                ],
            )?,
            Question::new(
                1,
                "What does PPE stand for?",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Personal protective equipment", true),
                    AnswerOption::new("Primary prevention exercise", false),
                ],
            )?,
            Question::new(
                2,
                "A hazard is best described as",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Anything with the potential to cause harm", true),
                    AnswerOption::new("An accident that already happened", false),
                    AnswerOption::new("A safety inspection", false),
                ],
            )?,
            Question::new(
                3,
                "An incident report should be filed",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("As soon as possible after the event", true),
                    AnswerOption::new("Only for injuries needing treatment", false),
                ],
            )?,
        ],
        vec![
            AccordionItem::new(
                "ppe",
                "Protective equipment",
                "Gloves, aprons and eye protection form the last line of defence.",
            )?
            .with_control(ControlQuestion::new(
                "PPE replaces safe working procedures.",
                vec![
                    AnswerOption::new("False", true),
                    AnswerOption::new("True", false),
                ],
            )?),
            AccordionItem::new(
                "hazard-classes",
                "Classes of hazard",
                "Biological, chemical and physical hazards call for different controls.",
            )?
            .with_control(ControlQuestion::new(
                "A wet floor is which class of hazard?",
                vec![
                    AnswerOption::new("Physical", true),
                    AnswerOption::new("Biological", false),
                    AnswerOption::new("Chemical", false),
                ],
            )?),
            AccordionItem::new(
                "incident-reports",
                "Reporting incidents",
                "Near misses count; reporting them prevents the real thing.",
            )?
            .with_control(ControlQuestion::new(
                "Near misses should be reported.",
                vec![
                    AnswerOption::new("Yes, always", true),
                    AnswerOption::new("Only if someone was hurt", false),
                ],
            )?),
        ],
    )?;

    let reflection = Module::new(
        ModuleId::new("daily-habits")?,
        "Daily Habits",
        ModuleKind::Reflection,
        50,
        vec![
            Question::new(
                0,
                "How often do you take a proper break?",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Every hour or two", true),
                    AnswerOption::new("Rarely", false),
                    AnswerOption::new("Never", false),
                ],
            )?,
            Question::new(
                1,
                "Do you review your routine at the end of the week?",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Yes, regularly", true),
                    AnswerOption::new("Sometimes", false),
                    AnswerOption::new("No", false),
                ],
            )?,
        ],
        Vec::new(),
    )?;

    let survey = Module::new(
        ModuleId::new("course-survey")?,
        "Course Survey",
        ModuleKind::Survey,
        45,
        vec![
            Question::new(
                0,
                "I can name the core hygiene rules.",
                QuestionKind::Knowledge,
                vec![
                    AnswerOption::new("Agree", true),
                    AnswerOption::new("Disagree", false),
                ],
            )?,
            Question::new(
                1,
                "The pace of the material was",
                QuestionKind::Feedback,
                vec![
                    AnswerOption::new("About right", false),
                    AnswerOption::new("Too fast", false),
                    AnswerOption::new("Too slow", false),
                ],
            )?,
            Question::new(
                2,
                "Anything else you want to tell us?",
                QuestionKind::Survey,
                Vec::new(),
            )?
            .with_embed(Url::parse("https://forms.example.com/course-survey")?),
            Question::new(
                3,
                "Community results",
                QuestionKind::SurveyResults,
                vec![AnswerOption::new("Reviewed", false)],
            )?,
        ],
        vec![
            AccordionItem::new(
                "myth-busting",
                "Myth busting",
                "Cold water washes hands just as well as hot, given soap and time.",
            )?
            .with_control(ControlQuestion::new(
                "Water temperature decides how clean hands get.",
                vec![
                    AnswerOption::new("False", true),
                    AnswerOption::new("True", false),
                ],
            )?),
        ],
    )?;

    Ok(LearningArea::new(
        AreaId::new("everyday-health")?,
        "Everyday Health",
        vec![hygiene, terms, reflection, survey],
    )?)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        // printing once at the binary layer is enough
        eprintln!("{err}");
        std::process::exit(2);
    }
}
