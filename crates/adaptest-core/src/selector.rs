//! Two-phase content-balanced item selection.
//!
//! While fewer than `topics × min_questions_per_topic` answers exist, the
//! coverage phase seeds under-sampled topics with items near the current
//! ability. After that, the adaptive phase picks the globally most useful
//! item: Fisher information weighted by content balance and by the square
//! root of the topic's standard error.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::CatConfig;
use crate::irt::item_information;
use crate::model::{Item, ItemCatalog, TopicAbility};

/// Which selection phase produced an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPhase {
    Coverage,
    Adaptive,
}

/// The item chosen for administration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub item_id: String,
    pub topic: String,
    pub phase: SelectionPhase,
    /// Difficulty distance in the coverage phase, utility in the adaptive phase.
    pub score: f64,
}

/// Chooses the next item for a session.
#[derive(Debug, Clone)]
pub struct ItemSelector {
    config: CatConfig,
}

impl ItemSelector {
    pub fn new(config: CatConfig) -> Self {
        Self { config }
    }

    /// Phase the selector is in for the given answered total.
    pub fn phase(&self, topic_count: usize, total_answered: u32) -> SelectionPhase {
        let coverage_target = topic_count as u64 * self.config.min_questions_per_topic as u64;
        if (total_answered as u64) < coverage_target {
            SelectionPhase::Coverage
        } else {
            SelectionPhase::Adaptive
        }
    }

    /// Pick the next item, or `None` if no topic has an eligible item left.
    ///
    /// Items in `answered` are never returned.
    pub fn select_next(
        &self,
        abilities: &[TopicAbility],
        answered: &HashSet<String>,
        catalog: &ItemCatalog,
    ) -> Option<Selection> {
        let total_answered: u32 = abilities.iter().map(|t| t.questions_answered).sum();
        tracing::debug!(
            "selecting: {total_answered} answered, coverage target {}",
            abilities.len() as u64 * self.config.min_questions_per_topic as u64
        );

        if self.phase(abilities.len(), total_answered) == SelectionPhase::Coverage {
            if let Some(selection) = self.select_for_coverage(abilities, answered, catalog) {
                return Some(selection);
            }
            tracing::debug!("coverage phase: every under-covered topic is exhausted");
        }

        self.select_adaptive(abilities, answered, catalog, total_answered)
    }

    fn select_for_coverage(
        &self,
        abilities: &[TopicAbility],
        answered: &HashSet<String>,
        catalog: &ItemCatalog,
    ) -> Option<Selection> {
        let mut target: Option<(&TopicAbility, Vec<&Item>)> = None;

        for ability in abilities
            .iter()
            .filter(|t| t.questions_answered < self.config.min_questions_per_topic)
        {
            let candidates = candidates(catalog, &ability.topic, answered);
            if candidates.is_empty() {
                tracing::debug!("coverage phase: topic '{}' has no items left", ability.topic);
                continue;
            }
            let larger_error = target
                .as_ref()
                .is_none_or(|(best, _)| ability.standard_error > best.standard_error);
            if larger_error {
                target = Some((ability, candidates));
            }
        }

        let (ability, candidates) = target?;
        let mut best: Option<(&Item, f64)> = None;
        for item in candidates {
            let distance = (item.difficulty - ability.theta).abs();
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((item, distance)),
            }
        }

        best.map(|(item, distance)| {
            tracing::debug!(
                "coverage phase: topic '{}' (SE={:.3}) -> item '{}' (|b - theta|={distance:.3})",
                ability.topic,
                ability.standard_error,
                item.id
            );
            Selection {
                item_id: item.id.clone(),
                topic: ability.topic.clone(),
                phase: SelectionPhase::Coverage,
                score: distance,
            }
        })
    }

    fn select_adaptive(
        &self,
        abilities: &[TopicAbility],
        answered: &HashSet<String>,
        catalog: &ItemCatalog,
        total_answered: u32,
    ) -> Option<Selection> {
        let expected_proportion = 1.0 / abilities.len().max(1) as f64;
        let mut best: Option<Selection> = None;

        for ability in abilities {
            if ability.questions_answered >= self.config.max_questions_per_topic {
                continue;
            }

            let actual_proportion =
                ability.questions_answered as f64 / total_answered.max(1) as f64;
            let content_weight = (expected_proportion / actual_proportion.max(0.01)).max(0.1);

            let Some((item, info)) = self.most_informative(catalog, ability, answered) else {
                continue;
            };

            let utility = info * content_weight * ability.standard_error.sqrt();
            tracing::debug!(
                "topic '{}': info={info:.3}, content_weight={content_weight:.2}, SE={:.3}, utility={utility:.3}",
                ability.topic,
                ability.standard_error
            );

            if best.as_ref().is_none_or(|current| utility > current.score) {
                best = Some(Selection {
                    item_id: item.id.clone(),
                    topic: ability.topic.clone(),
                    phase: SelectionPhase::Adaptive,
                    score: utility,
                });
            }
        }

        if let Some(selection) = &best {
            tracing::debug!(
                "adaptive phase: item '{}' with utility {:.3}",
                selection.item_id,
                selection.score
            );
        }
        best
    }

    /// Unanswered item of a topic with the highest information at the topic's theta.
    fn most_informative<'a>(
        &self,
        catalog: &'a ItemCatalog,
        ability: &TopicAbility,
        answered: &HashSet<String>,
    ) -> Option<(&'a Item, f64)> {
        let mut best: Option<(&Item, f64)> = None;
        for item in candidates(catalog, &ability.topic, answered) {
            let info = item_information(ability.theta, &item.params(&self.config));
            match best {
                Some((_, best_info)) if best_info >= info => {}
                _ => best = Some((item, info)),
            }
        }
        best
    }
}

fn candidates<'a>(catalog: &'a ItemCatalog, topic: &str, answered: &HashSet<String>) -> Vec<&'a Item> {
    catalog
        .items_in_topic(topic)
        .filter(|item| !answered.contains(&item.id))
        .collect()
}
