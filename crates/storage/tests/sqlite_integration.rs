use assess_core::model::{
    AnswerSet, AnswerValue, AreaId, Badge, LearnerCode, LearnerRecord, MergeOutcome, ModuleId,
    OverallFeedback, ProgressPatch, ResponseEvent,
};
use assess_core::time::fixed_now;
use chrono::Duration;
use storage::repository::{
    BadgeRepository, EventRepository, FeedbackRepository, LearnerRepository, ProgressRepository,
    StorageError,
};
use storage::sqlite::SqliteRepository;

fn learner(raw: &str) -> LearnerCode {
    LearnerCode::new(raw).unwrap()
}

fn module(raw: &str) -> ModuleId {
    ModuleId::new(raw).unwrap()
}

async fn register(repo: &SqliteRepository, code: &LearnerCode) {
    let record = LearnerRecord::new(code.clone(), "Sam", fixed_now()).unwrap();
    repo.create_learner(&record).await.unwrap();
}

#[tokio::test]
async fn sqlite_roundtrip_persists_progress_and_answers() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let code = learner("AB1234");
    let hygiene = module("hygiene");
    register(&repo, &code).await;

    let mut answers = AnswerSet::new();
    answers.set_question(0, AnswerValue::SingleText("Wash hands".into()));
    answers.set_question(2, AnswerValue::MultiText(vec!["Soap".into(), "Water".into()]));
    answers.set_accordion("gloves", AnswerValue::SingleIndex(1));

    let first = ProgressPatch::new(fixed_now())
        .with_progress(1)
        .with_answers(answers.clone());
    assert_eq!(
        repo.merge_module_progress(&code, &hygiene, &first)
            .await
            .unwrap(),
        MergeOutcome::Applied
    );

    let stored = repo
        .module_progress(&code, &hygiene)
        .await
        .expect("read")
        .expect("record exists");
    assert!(!stored.is_completed());
    assert_eq!(stored.progress(), 1);
    assert_eq!(stored.answers(), &answers);

    // a score-only patch must not disturb the stored answers
    let later = fixed_now() + Duration::minutes(5);
    let score_only = ProgressPatch::new(later)
        .with_completed(true)
        .with_score(80)
        .with_progress(100);
    assert_eq!(
        repo.merge_module_progress(&code, &hygiene, &score_only)
            .await
            .unwrap(),
        MergeOutcome::Applied
    );

    let stored = repo
        .module_progress(&code, &hygiene)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_completed());
    assert_eq!(stored.score(), 80);
    assert_eq!(stored.answers(), &answers);
    assert_eq!(stored.last_updated(), later);

    // stale writes are skipped without touching the record
    let stale = ProgressPatch::new(fixed_now() - Duration::minutes(5)).with_score(5);
    assert_eq!(
        repo.merge_module_progress(&code, &hygiene, &stale)
            .await
            .unwrap(),
        MergeOutcome::Stale
    );
    let stored = repo
        .module_progress(&code, &hygiene)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.score(), 80);

    let all = repo.all_module_progress(&code).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all.get(&hygiene).unwrap().score(), 80);

    repo.reset_module_progress(&code, &hygiene, later + Duration::minutes(1))
        .await
        .unwrap();
    let stored = repo
        .module_progress(&code, &hygiene)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_completed());
    assert_eq!(stored.progress(), 0);
    assert!(stored.answers().is_empty());
}

#[tokio::test]
async fn sqlite_learner_codes_conflict_on_reuse() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_learners?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let code = learner("ZZ9999");
    register(&repo, &code).await;

    let duplicate = LearnerRecord::new(code.clone(), "Other", fixed_now()).unwrap();
    assert!(matches!(
        repo.create_learner(&duplicate).await,
        Err(StorageError::Conflict)
    ));

    repo.set_score_totals(&code, 120, 60).await.unwrap();
    let fetched = repo.get_learner(&code).await.unwrap();
    assert_eq!(fetched.total_points(), 120);
    assert_eq!(fetched.overall_progress(), 60);

    assert!(matches!(
        repo.get_learner(&learner("NOPE01")).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_supports_badges_feedback_and_events() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_artifacts?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let code = learner("CD5678");
    let hygiene = module("hygiene");
    let nutrition = module("nutrition");
    register(&repo, &code).await;

    let badge = Badge::new(hygiene.clone(), "Hand Hygiene", code.clone(), fixed_now());
    assert!(repo.insert_badge(&badge).await.unwrap());
    assert!(!repo.insert_badge(&badge).await.unwrap());
    assert_eq!(repo.count_badges().await.unwrap(), 1);

    let badges = repo.badges(&code).await.unwrap();
    assert_eq!(badges.get(&hygiene).unwrap().module_title(), "Hand Hygiene");

    let area = AreaId::new("care-basics").unwrap();
    let feedback = OverallFeedback::new(5, hygiene.clone(), 4, fixed_now()).unwrap();
    assert!(
        repo.insert_overall_feedback(&code, &area, &feedback)
            .await
            .unwrap()
    );
    let second = OverallFeedback::new(1, nutrition.clone(), 1, fixed_now()).unwrap();
    assert!(
        !repo
            .insert_overall_feedback(&code, &area, &second)
            .await
            .unwrap()
    );
    let stored = repo
        .overall_feedback(&code, &area)
        .await
        .unwrap()
        .expect("feedback exists");
    assert_eq!(stored.satisfaction(), 5);
    assert_eq!(stored.favorite_module(), &hygiene);

    let listed = repo.list_feedback_for_area(&area).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].0, code);

    let multi = ResponseEvent::record(
        code.clone(),
        hygiene.clone(),
        2,
        "Which supplies are needed?",
        vec!["Soap".into(), "Water".into()],
        fixed_now(),
    );
    let single = ResponseEvent::record(
        code.clone(),
        hygiene.clone(),
        0,
        "When should you wash?",
        vec!["Before contact".into()],
        fixed_now() + Duration::seconds(1),
    );
    let elsewhere = ResponseEvent::record(
        code.clone(),
        nutrition.clone(),
        1,
        "Pick a food group",
        vec!["Grains".into()],
        fixed_now(),
    );
    repo.append_events(&[multi.clone(), single.clone(), elsewhere])
        .await
        .unwrap();

    let events = repo.events_for_module(&hygiene).await.unwrap();
    assert_eq!(events.len(), 2);
    let stored_multi = events
        .iter()
        .find(|e| e.id() == multi.id())
        .expect("multi-select event");
    assert_eq!(stored_multi.selected(), ["Soap", "Water"]);
    assert_eq!(stored_multi.question_ordinal(), 2);
    let stored_single = events
        .iter()
        .find(|e| e.id() == single.id())
        .expect("single-select event");
    assert_eq!(stored_single.selected(), ["Before contact"]);

    assert_eq!(repo.events_for_module(&nutrition).await.unwrap().len(), 1);
}
