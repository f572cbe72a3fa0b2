//! Session orchestrator: the answer → estimate → stop-or-select loop.
//!
//! A session owns its topic abilities and append-only response log and
//! shares the item catalog read-only. Answers are processed one at a time;
//! independent sessions can run on different threads without coordination.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::CatConfig;
use crate::error::CatError;
use crate::estimator::AbilityEstimator;
use crate::mastery::{mastery_score, MasteryThresholds, MASTERY_SCALE};
use crate::model::{ItemCatalog, ItemParams, ResponseRecord, SessionStatus, TopicAbility};
use crate::report::{PlacementResults, TopicResult};
use crate::selector::{ItemSelector, Selection};
use crate::termination::{Decision, StopReason, TerminationPolicy};

/// What the caller should do after an answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Administer `selection` next.
    Next {
        selection: Selection,
        abilities: Vec<TopicAbility>,
    },
    /// The session is finished.
    Completed(PlacementResults),
}

/// One examinee's adaptive placement test.
#[derive(Debug)]
pub struct AdaptiveSession {
    id: Uuid,
    catalog: Arc<ItemCatalog>,
    config: CatConfig,
    estimator: AbilityEstimator,
    selector: ItemSelector,
    policy: TerminationPolicy,
    thresholds: MasteryThresholds,
    abilities: Vec<TopicAbility>,
    responses: Vec<ResponseRecord>,
    answered: HashSet<String>,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    stop_reason: Option<StopReason>,
    current: Option<Selection>,
}

impl AdaptiveSession {
    /// Start a session over `topics` and select the first item.
    ///
    /// Duplicate topic ids are ignored after their first occurrence. Every
    /// item of the requested topics is re-validated against `config`.
    pub fn start(
        catalog: Arc<ItemCatalog>,
        topics: &[String],
        config: CatConfig,
    ) -> Result<(Self, Selection), CatError> {
        config.validate()?;
        if topics.is_empty() {
            return Err(CatError::EmptyCurriculum);
        }

        let mut seen = HashSet::new();
        let mut abilities = Vec::with_capacity(topics.len());
        for topic in topics {
            if catalog.topic(topic).is_none() {
                return Err(CatError::UnknownTopic(topic.clone()));
            }
            if seen.insert(topic.as_str()) {
                abilities.push(TopicAbility::new(topic.as_str()));
            }
        }

        // Asymptotes resolve against this session's defaults, which may
        // differ from the ones the catalog was checked with.
        for ability in &abilities {
            for item in catalog.items_in_topic(&ability.topic) {
                item.validate(&config)?;
            }
        }

        let mut session = Self {
            id: Uuid::new_v4(),
            estimator: AbilityEstimator::new(config.clone()),
            selector: ItemSelector::new(config.clone()),
            policy: TerminationPolicy::new(config.clone()),
            thresholds: MasteryThresholds::default(),
            config,
            catalog,
            abilities,
            responses: Vec::new(),
            answered: HashSet::new(),
            status: SessionStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            stop_reason: None,
            current: None,
        };

        let first = session
            .selector
            .select_next(&session.abilities, &session.answered, &session.catalog)
            .ok_or(CatError::NoItemsAvailable)?;
        session.current = Some(first.clone());

        tracing::info!(
            "session {} started: {} topics, first item '{}'",
            session.id,
            session.abilities.len(),
            first.item_id
        );
        Ok((session, first))
    }

    /// Start a session covering every topic in the catalog.
    pub fn start_all(
        catalog: Arc<ItemCatalog>,
        config: CatConfig,
    ) -> Result<(Self, Selection), CatError> {
        let topics = catalog.topic_ids();
        Self::start(catalog, &topics, config)
    }

    /// Record an answer, update abilities, then either stop or pick the next item.
    pub fn submit_answer(&mut self, item_id: &str, correct: bool) -> Result<Step, CatError> {
        if self.status == SessionStatus::Completed {
            return Err(CatError::SessionCompleted(self.id));
        }
        let item = self
            .catalog
            .item(item_id)
            .ok_or_else(|| CatError::UnknownItem(item_id.to_string()))?;
        let topic = item.topic.clone();
        let Some(slot) = self.abilities.iter().position(|a| a.topic == topic) else {
            return Err(CatError::UnknownTopic(topic));
        };
        if self.answered.contains(item_id) {
            return Err(CatError::ItemAlreadyAnswered(item_id.to_string()));
        }
        if let Some(current) = &self.current {
            if current.item_id != item_id {
                tracing::debug!(
                    "answer for '{item_id}' while '{}' was pending",
                    current.item_id
                );
            }
        }

        self.responses.push(ResponseRecord {
            item_id: item_id.to_string(),
            topic: topic.clone(),
            correct,
            answered_at: Utc::now(),
        });
        self.answered.insert(item_id.to_string());
        self.abilities[slot].questions_answered += 1;

        if self.config.refresh_all_topics {
            for idx in 0..self.abilities.len() {
                self.refresh(idx);
            }
        } else {
            self.refresh(slot);
        }

        if let Decision::Terminate(reason) = self.policy.evaluate(&self.abilities) {
            return Ok(Step::Completed(self.finalize(reason)));
        }

        match self
            .selector
            .select_next(&self.abilities, &self.answered, &self.catalog)
        {
            Some(selection) => {
                self.current = Some(selection.clone());
                Ok(Step::Next {
                    selection,
                    abilities: self.abilities.clone(),
                })
            }
            None => Ok(Step::Completed(self.finalize(StopReason::ItemsExhausted))),
        }
    }

    /// Re-estimate one topic from its full response history.
    fn refresh(&mut self, idx: usize) {
        let ability = &self.abilities[idx];
        let (responses, params): (Vec<bool>, Vec<ItemParams>) = self
            .responses
            .iter()
            .filter(|r| r.topic == ability.topic)
            .filter_map(|r| {
                self.catalog
                    .item(&r.item_id)
                    .map(|item| (r.correct, item.params(&self.config)))
            })
            .unzip();

        let estimate = self.estimator.estimate(&responses, &params, ability.theta);
        let ability = &mut self.abilities[idx];
        ability.theta = estimate.theta;
        ability.standard_error = estimate.standard_error;
        ability.method = estimate.method;
        tracing::debug!(
            "topic '{}': theta={:.3}, SE={:.3} ({:?}, {} answers)",
            ability.topic,
            ability.theta,
            ability.standard_error,
            ability.method,
            ability.questions_answered
        );
    }

    fn finalize(&mut self, reason: StopReason) -> PlacementResults {
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.stop_reason = Some(reason);
        self.current = None;
        tracing::info!(
            "session {} completed after {} answers: {reason}",
            self.id,
            self.responses.len()
        );
        self.results()
    }

    /// Per-topic results as of now. Final once the session is completed.
    pub fn results(&self) -> PlacementResults {
        let topics = self
            .abilities
            .iter()
            .map(|ability| {
                let num_correct = self
                    .responses
                    .iter()
                    .filter(|r| r.topic == ability.topic && r.correct)
                    .count() as u32;
                let score = if ability.questions_answered == 0 {
                    0
                } else {
                    mastery_score(ability.theta, MASTERY_SCALE)
                };
                TopicResult {
                    topic: ability.topic.clone(),
                    theta: ability.theta,
                    standard_error: ability.standard_error,
                    mastery_score: score,
                    level: self.thresholds.classify(score),
                    num_answered: ability.questions_answered,
                    num_correct,
                    correct_ratio: if ability.questions_answered == 0 {
                        0.0
                    } else {
                        num_correct as f64 / ability.questions_answered as f64
                    },
                }
            })
            .collect();

        PlacementResults {
            session_id: self.id,
            status: self.status,
            started_at: self.started_at,
            completed_at: self.completed_at,
            stop_reason: self.stop_reason,
            total_answered: self.responses.len() as u32,
            topics,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn abilities(&self) -> &[TopicAbility] {
        &self.abilities
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    /// Item most recently handed to the examinee, if the session is running.
    pub fn current_item(&self) -> Option<&Selection> {
        self.current.as_ref()
    }

    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Item;
    use crate::selector::SelectionPhase;

    fn item(id: &str, topic: &str, b: f64) -> Item {
        Item {
            id: id.into(),
            topic: topic.into(),
            discrimination: 1.2,
            difficulty: b,
            guessing: Some(0.2),
            slip: None,
            content: String::new(),
        }
    }

    fn catalog(topics: &[&str], per_topic: usize) -> Arc<ItemCatalog> {
        let mut items = Vec::new();
        for topic in topics {
            for i in 0..per_topic {
                let b = -2.0 + 4.0 * i as f64 / per_topic.max(2) as f64;
                items.push(item(&format!("{topic}-{i}"), topic, b));
            }
        }
        Arc::new(ItemCatalog::from_items(items, &CatConfig::default()).unwrap())
    }

    fn topics(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn start_selects_coverage_item() {
        let (session, first) =
            AdaptiveSession::start(catalog(&["a", "b"], 5), &topics(&["a", "b"]), CatConfig::default())
                .unwrap();
        assert_eq!(first.phase, SelectionPhase::Coverage);
        assert_eq!(first.topic, "a");
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert!(session.abilities().iter().all(|a| a.theta == 0.0 && a.standard_error == 1.0));
        assert_eq!(session.current_item(), Some(&first));
    }

    #[test]
    fn start_rejects_empty_and_unknown_topics() {
        let cat = catalog(&["a"], 3);
        assert!(matches!(
            AdaptiveSession::start(cat.clone(), &[], CatConfig::default()),
            Err(CatError::EmptyCurriculum)
        ));
        assert!(matches!(
            AdaptiveSession::start(cat, &topics(&["zzz"]), CatConfig::default()),
            Err(CatError::UnknownTopic(t)) if t == "zzz"
        ));
    }

    #[test]
    fn start_rejects_items_invalid_under_session_defaults() {
        let mut items: Vec<Item> = (0..3).map(|i| item(&format!("a-{i}"), "a", 0.0)).collect();
        items[1].guessing = Some(0.6);
        let cat = Arc::new(ItemCatalog::from_items(items, &CatConfig::default()).unwrap());

        let config = CatConfig {
            slip: 0.5,
            ..Default::default()
        };
        let err = AdaptiveSession::start_all(cat.clone(), config).unwrap_err();
        assert!(matches!(err, CatError::InvalidItem { ref item_id, .. } if item_id == "a-1"));

        assert!(AdaptiveSession::start_all(cat, CatConfig::default()).is_ok());
    }

    #[test]
    fn start_with_invalid_config_fails() {
        let config = CatConfig {
            min_questions_per_topic: 20,
            max_questions_per_topic: 5,
            ..Default::default()
        };
        let result = AdaptiveSession::start_all(catalog(&["a"], 3), config);
        assert!(matches!(result, Err(CatError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_unknown_and_repeated_answers() {
        let (mut session, first) =
            AdaptiveSession::start_all(catalog(&["a", "b"], 5), CatConfig::default()).unwrap();

        assert!(matches!(
            session.submit_answer("nope", true),
            Err(CatError::UnknownItem(_))
        ));

        session.submit_answer(&first.item_id, true).unwrap();
        assert!(matches!(
            session.submit_answer(&first.item_id, false),
            Err(CatError::ItemAlreadyAnswered(id)) if id == first.item_id
        ));
        assert_eq!(session.responses().len(), 1);
    }

    #[test]
    fn rejects_item_outside_curriculum() {
        let (mut session, _) =
            AdaptiveSession::start(catalog(&["a", "b"], 3), &topics(&["a"]), CatConfig::default())
                .unwrap();
        assert!(matches!(
            session.submit_answer("b-0", true),
            Err(CatError::UnknownTopic(t)) if t == "b"
        ));
    }

    #[test]
    fn runs_to_completion_and_locks() {
        let (mut session, first) =
            AdaptiveSession::start_all(catalog(&["a", "b"], 6), CatConfig::default()).unwrap();
        let mut next = first.item_id;
        let mut flip = false;
        let results = loop {
            flip = !flip;
            match session.submit_answer(&next, flip).unwrap() {
                Step::Next { selection, .. } => next = selection.item_id,
                Step::Completed(results) => break results,
            }
        };

        assert!(session.is_completed());
        assert_eq!(results.status, SessionStatus::Completed);
        assert!(results.completed_at.is_some());
        assert!(results.stop_reason.is_some());
        assert!(session.current_item().is_none());

        let err = session.submit_answer("a-0", true).unwrap_err();
        assert!(matches!(err, CatError::SessionCompleted(id) if id == session.id()));
    }

    #[test]
    fn counts_match_response_log() {
        let (mut session, first) =
            AdaptiveSession::start_all(catalog(&["a", "b", "c"], 4), CatConfig::default()).unwrap();
        let mut next = Some(first.item_id);
        let mut i = 0;
        while let Some(id) = next.take() {
            i += 1;
            if let Step::Next { selection, .. } = session.submit_answer(&id, i % 3 != 0).unwrap() {
                next = Some(selection.item_id);
            }
        }

        for ability in session.abilities() {
            let logged = session
                .responses()
                .iter()
                .filter(|r| r.topic == ability.topic)
                .count() as u32;
            assert_eq!(ability.questions_answered, logged);
        }
        let unique: HashSet<&str> = session.responses().iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(unique.len(), session.responses().len());
    }

    #[test]
    fn hard_cap_stops_session() {
        let config = CatConfig {
            max_questions_total: 4,
            min_questions_per_topic: 1,
            max_questions_per_topic: 4,
            ..Default::default()
        };
        let (mut session, first) = AdaptiveSession::start_all(catalog(&["a"], 10), config).unwrap();
        let mut next = first.item_id;
        let mut answers = 0;
        loop {
            answers += 1;
            match session.submit_answer(&next, answers % 2 == 0).unwrap() {
                Step::Next { selection, .. } => next = selection.item_id,
                Step::Completed(results) => {
                    assert_eq!(results.total_answered, 4);
                    assert_eq!(results.stop_reason, Some(StopReason::HardCap));
                    break;
                }
            }
        }
    }

    #[test]
    fn exhausted_catalog_completes() {
        let (mut session, first) =
            AdaptiveSession::start_all(catalog(&["a"], 2), CatConfig::default()).unwrap();
        let second = match session.submit_answer(&first.item_id, true).unwrap() {
            Step::Next { selection, .. } => selection,
            Step::Completed(_) => panic!("completed after one answer"),
        };
        match session.submit_answer(&second.item_id, false).unwrap() {
            Step::Completed(results) => {
                assert_eq!(results.stop_reason, Some(StopReason::ItemsExhausted));
                let topic = results.topic("a").unwrap();
                assert_eq!((topic.num_answered, topic.num_correct), (2, 1));
                assert!((topic.correct_ratio - 0.5).abs() < 1e-12);
            }
            Step::Next { .. } => panic!("catalog should be exhausted"),
        }
    }

    #[test]
    fn unanswered_topic_reports_zero_mastery() {
        let (session, _) =
            AdaptiveSession::start_all(catalog(&["a", "b"], 3), CatConfig::default()).unwrap();
        let results = session.results();
        assert!(results.topics.iter().all(|t| t.mastery_score == 0));
        assert_eq!(results.stop_reason, None);
    }

    #[test]
    fn refreshing_only_answered_topic_gives_same_estimates() {
        let run = |refresh_all_topics: bool| {
            let config = CatConfig {
                refresh_all_topics,
                ..Default::default()
            };
            let (mut session, first) =
                AdaptiveSession::start_all(catalog(&["a", "b"], 6), config).unwrap();
            let mut next = Some(first.item_id);
            let mut i = 0;
            while let Some(id) = next.take() {
                i += 1;
                if let Step::Next { selection, .. } = session.submit_answer(&id, i % 2 == 1).unwrap()
                {
                    next = Some(selection.item_id);
                }
            }
            session.abilities().to_vec()
        };
        let (all, answered_only) = (run(true), run(false));
        assert_eq!(all.len(), answered_only.len());
        for (x, y) in all.iter().zip(&answered_only) {
            assert_eq!(x.questions_answered, y.questions_answered);
            assert!((x.theta - y.theta).abs() < 1e-6);
            assert!((x.standard_error - y.standard_error).abs() < 1e-6);
        }
    }
}
