//! End-to-end session scenarios driven through the public engine API.
//!
//! These tests exercise the full answer → estimate → stop-or-select loop
//! on small catalogs where the expected behavior can be stated exactly.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use adaptest_core::config::CatConfig;
use adaptest_core::mastery::MasteryThresholds;
use adaptest_core::model::{Item, ItemCatalog, SessionStatus};
use adaptest_core::parser::parse_catalog;
use adaptest_core::pathway::{build_pathway, OverallLevel};
use adaptest_core::selector::SelectionPhase;
use adaptest_core::session::{AdaptiveSession, Step};
use adaptest_core::termination::StopReason;

fn standard_item(id: &str) -> Item {
    Item {
        id: id.into(),
        topic: "algebra".into(),
        discrimination: 1.0,
        difficulty: 0.0,
        guessing: Some(0.2),
        slip: Some(0.05),
        content: String::new(),
    }
}

fn algebra_catalog() -> Arc<ItemCatalog> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../catalogs/algebra.toml");
    Arc::new(parse_catalog(&path, &CatConfig::default()).unwrap())
}

/// Answer every item the session hands out with `answer(item_id, step)`.
fn drive(
    session: &mut AdaptiveSession,
    first: String,
    mut answer: impl FnMut(&str, usize) -> bool,
) -> Vec<String> {
    let mut administered = Vec::new();
    let mut next = Some(first);
    while let Some(item_id) = next.take() {
        let correct = answer(&item_id, administered.len());
        administered.push(item_id.clone());
        if let Step::Next { selection, .. } = session.submit_answer(&item_id, correct).unwrap() {
            next = Some(selection.item_id);
        }
    }
    administered
}

#[test]
fn e2e_single_topic_three_correct_two_incorrect() {
    let items = (1..=5).map(|i| standard_item(&format!("q{i}"))).collect();
    let catalog = Arc::new(ItemCatalog::from_items(items, &CatConfig::default()).unwrap());

    let (mut session, first) = AdaptiveSession::start_all(catalog, CatConfig::default()).unwrap();
    assert_eq!(first.phase, SelectionPhase::Coverage);

    let administered = drive(&mut session, first.item_id, |_, step| step < 3);

    assert!(session.is_completed());
    assert_eq!(session.stop_reason(), Some(StopReason::ItemsExhausted));

    let responses = session.responses();
    assert_eq!(responses.len(), 5);
    let unique: HashSet<&str> = responses.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(unique.len(), 5);
    assert_eq!(administered.len(), 5);

    let ability = &session.abilities()[0];
    assert!(ability.theta > -4.0 && ability.theta < 4.0, "theta={}", ability.theta);
    assert!(ability.standard_error <= 2.0);
    assert_eq!(ability.questions_answered, 5);

    let results = session.results();
    let topic = results.topic("algebra").unwrap();
    assert_eq!((topic.num_answered, topic.num_correct), (5, 3));
}

#[test]
fn e2e_coverage_before_adaptivity() {
    let (mut session, first) =
        AdaptiveSession::start_all(algebra_catalog(), CatConfig::default()).unwrap();
    let administered = drive(&mut session, first.item_id, |_, step| step % 2 == 0);

    // The first nine items cover every topic three times.
    let catalog = session.catalog();
    let mut per_topic = std::collections::HashMap::new();
    for id in &administered[..9] {
        *per_topic
            .entry(catalog.item(id).unwrap().topic.clone())
            .or_insert(0) += 1;
    }
    assert_eq!(per_topic.len(), 3);
    assert!(per_topic.values().all(|&n| n == 3));
}

#[test]
fn e2e_session_respects_limits() {
    let config = CatConfig::default();
    let (mut session, first) =
        AdaptiveSession::start_all(algebra_catalog(), config.clone()).unwrap();
    drive(&mut session, first.item_id, |id, _| id.ends_with('1') || id.ends_with('3'));

    let results = session.results();
    assert_eq!(results.status, SessionStatus::Completed);
    assert!(results.total_answered <= config.max_questions_total);
    for topic in &results.topics {
        assert!(topic.num_answered >= config.min_questions_per_topic);
        assert!(topic.num_answered <= config.max_questions_per_topic);
        assert!(topic.mastery_score <= 800);
    }
}

#[test]
fn e2e_strong_examinee_places_high() {
    let (mut session, first) =
        AdaptiveSession::start_all(algebra_catalog(), CatConfig::default()).unwrap();
    drive(&mut session, first.item_id, |_, _| true);

    let results = session.results();
    for topic in &results.topics {
        assert_eq!(topic.theta, 4.0);
        assert_eq!(topic.standard_error, 0.8);
    }

    let pathway = build_pathway(
        &results.topics,
        session.catalog().graph(),
        &MasteryThresholds::default(),
    );
    assert_eq!(pathway.overall_level, OverallLevel::Advanced);
    assert!(pathway.steps.iter().all(|s| s.unlocked));
    assert!(pathway.recommended().is_empty());
}

#[test]
fn e2e_weak_foundation_locks_later_topics() {
    let (mut session, first) =
        AdaptiveSession::start_all(algebra_catalog(), CatConfig::default()).unwrap();
    drive(&mut session, first.item_id, |id, _| !id.starts_with("ar-"));

    let results = session.results();
    let pathway = build_pathway(
        &results.topics,
        session.catalog().graph(),
        &MasteryThresholds::default(),
    );
    let quadratics = pathway.steps.iter().find(|s| s.topic == "quadratics").unwrap();
    assert!(!quadratics.unlocked);
    assert!(quadratics.blocked_by.contains(&"arithmetic".to_string()));
}

#[test]
fn e2e_sessions_share_catalog_across_threads() {
    let catalog = algebra_catalog();
    let handles: Vec<_> = (0..4)
        .map(|k| {
            let catalog = Arc::clone(&catalog);
            std::thread::spawn(move || {
                let (mut session, first) =
                    AdaptiveSession::start_all(catalog, CatConfig::default()).unwrap();
                drive(&mut session, first.item_id, |_, step| (step + k) % 3 != 0);
                session.results()
            })
        })
        .collect();

    for handle in handles {
        let results = handle.join().unwrap();
        assert_eq!(results.status, SessionStatus::Completed);
    }
}
