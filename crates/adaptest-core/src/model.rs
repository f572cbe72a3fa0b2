//! Core data model types for adaptest.
//!
//! Items and the catalog are authored content, shared read-only between
//! sessions. Response records and topic abilities belong to one session.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CatConfig;
use crate::error::CatError;
use crate::estimator::EstimationMethod;
use crate::pathway::TopicGraph;

/// A scored test question with item response parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier for this item.
    pub id: String,
    /// Topic this item belongs to.
    pub topic: String,
    /// Discrimination `a`: steepness of the characteristic curve.
    pub discrimination: f64,
    /// Difficulty `b`: location of the curve's midpoint.
    pub difficulty: f64,
    /// Guessing `c`: lower asymptote. Falls back to the engine default.
    #[serde(default)]
    pub guessing: Option<f64>,
    /// Careless-error probability. Falls back to the engine default.
    #[serde(default)]
    pub slip: Option<f64>,
    /// Question text, carried for callers that render items.
    #[serde(default)]
    pub content: String,
}

/// Resolved four-parameter logistic parameters of one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemParams {
    /// Discrimination.
    pub a: f64,
    /// Difficulty.
    pub b: f64,
    /// Lower asymptote (guessing).
    pub c: f64,
    /// Upper asymptote (one minus slip).
    pub d: f64,
}

impl ItemParams {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }
}

impl Item {
    /// Resolve this item's response parameters against the engine defaults.
    pub fn params(&self, config: &CatConfig) -> ItemParams {
        let c = self.guessing.unwrap_or(config.default_guessing);
        let d = 1.0 - self.slip.unwrap_or(config.slip);
        ItemParams::new(self.discrimination, self.difficulty, c, d)
    }

    /// Reject parameters that would corrupt ability estimates.
    pub fn validate(&self, config: &CatConfig) -> Result<(), CatError> {
        if self.id.trim().is_empty() {
            return Err(CatError::invalid_item(&self.id, "id is empty"));
        }
        if self.topic.trim().is_empty() {
            return Err(CatError::invalid_item(&self.id, "topic is empty"));
        }
        if !self.discrimination.is_finite() || self.discrimination <= 0.0 {
            return Err(CatError::invalid_item(
                &self.id,
                format!(
                    "discrimination must be finite and positive, got {}",
                    self.discrimination
                ),
            ));
        }
        if !self.difficulty.is_finite() {
            return Err(CatError::invalid_item(&self.id, "difficulty is not finite"));
        }
        if let Some(c) = self.guessing {
            if !(0.0..1.0).contains(&c) {
                return Err(CatError::invalid_item(
                    &self.id,
                    format!("guessing must lie in [0, 1), got {c}"),
                ));
            }
        }
        if let Some(s) = self.slip {
            if !(0.0..1.0).contains(&s) {
                return Err(CatError::invalid_item(
                    &self.id,
                    format!("slip must lie in [0, 1), got {s}"),
                ));
            }
        }

        let params = self.params(config);
        if params.c >= params.d {
            return Err(CatError::invalid_item(
                &self.id,
                format!(
                    "lower asymptote {} is not below upper asymptote {}",
                    params.c, params.d
                ),
            ));
        }

        Ok(())
    }
}

/// A curriculum topic, the grouping key for items and abilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    /// Unique identifier for this topic.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// Topics that should be mastered before this one.
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

impl Topic {
    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Descriptive header of a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The validated, read-only item bank shared by every session.
#[derive(Debug, Clone)]
pub struct ItemCatalog {
    info: CatalogInfo,
    topics: Vec<Topic>,
    items: Vec<Item>,
    by_id: HashMap<String, usize>,
    by_topic: HashMap<String, Vec<usize>>,
    graph: TopicGraph,
}

impl ItemCatalog {
    /// Build a catalog, validating every item and the prerequisite graph.
    ///
    /// Topics referenced by items but not declared are appended in order of
    /// first appearance, named after their id.
    pub fn new(
        info: CatalogInfo,
        mut topics: Vec<Topic>,
        items: Vec<Item>,
        config: &CatConfig,
    ) -> Result<Self, CatError> {
        let mut declared: HashSet<String> = HashSet::new();
        for topic in &topics {
            if !declared.insert(topic.id.clone()) {
                return Err(CatError::InvalidPathway(format!(
                    "topic '{}' is declared twice",
                    topic.id
                )));
            }
        }

        let mut by_id = HashMap::with_capacity(items.len());
        let mut by_topic: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, item) in items.iter().enumerate() {
            item.validate(config)?;
            if by_id.insert(item.id.clone(), idx).is_some() {
                return Err(CatError::DuplicateItem(item.id.clone()));
            }
            if declared.insert(item.topic.clone()) {
                topics.push(Topic {
                    id: item.topic.clone(),
                    name: String::new(),
                    prerequisites: Vec::new(),
                });
            }
            by_topic.entry(item.topic.clone()).or_default().push(idx);
        }

        let graph = TopicGraph::from_topics(&topics)?;

        Ok(Self {
            info,
            topics,
            items,
            by_id,
            by_topic,
            graph,
        })
    }

    /// Build an anonymous catalog from items alone.
    pub fn from_items(items: Vec<Item>, config: &CatConfig) -> Result<Self, CatError> {
        Self::new(CatalogInfo::default(), Vec::new(), items, config)
    }

    pub fn info(&self) -> &CatalogInfo {
        &self.info
    }

    /// Topics in declaration order.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Topic ids in declaration order.
    pub fn topic_ids(&self) -> Vec<String> {
        self.topics.iter().map(|t| t.id.clone()).collect()
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.id == id)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    /// Items of one topic, in catalog order.
    pub fn items_in_topic<'a>(&'a self, topic: &str) -> impl Iterator<Item = &'a Item> + 'a {
        self.by_topic
            .get(topic)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.items[idx])
    }

    pub fn topic_item_count(&self, topic: &str) -> usize {
        self.by_topic.get(topic).map_or(0, Vec::len)
    }

    /// Prerequisite graph over the catalog's topics.
    pub fn graph(&self) -> &TopicGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One submitted answer. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub item_id: String,
    pub topic: String,
    pub correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Current ability estimate for one topic within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicAbility {
    pub topic: String,
    /// Ability estimate on the theta scale.
    pub theta: f64,
    pub standard_error: f64,
    pub questions_answered: u32,
    /// How the current estimate was produced.
    pub method: EstimationMethod,
}

impl TopicAbility {
    /// Fresh state for a topic: theta 0, standard error 1, nothing answered.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            theta: 0.0,
            standard_error: 1.0,
            questions_answered: 0,
            method: EstimationMethod::Prior,
        }
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in-progress"),
            SessionStatus::Completed => write!(f, "completed"),
        }
    }
}
