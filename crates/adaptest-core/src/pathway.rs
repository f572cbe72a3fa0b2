//! Topic prerequisite graph and learning pathways derived from placement results.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatError;
use crate::mastery::{MasteryLevel, MasteryThresholds};
use crate::model::Topic;
use crate::report::TopicResult;

/// Directed acyclic graph of topic prerequisites.
#[derive(Debug, Clone, Default)]
pub struct TopicGraph {
    order: Vec<String>,
    names: HashMap<String, String>,
    prerequisites: HashMap<String, Vec<String>>,
}

impl TopicGraph {
    /// Build the graph, rejecting unknown prerequisite ids and cycles.
    pub fn from_topics(topics: &[Topic]) -> Result<Self, CatError> {
        let known: HashSet<&str> = topics.iter().map(|t| t.id.as_str()).collect();

        let mut graph = TopicGraph::default();
        for topic in topics {
            for prereq in &topic.prerequisites {
                if !known.contains(prereq.as_str()) {
                    return Err(CatError::InvalidPathway(format!(
                        "topic '{}' requires unknown topic '{prereq}'",
                        topic.id
                    )));
                }
            }
            graph.order.push(topic.id.clone());
            graph
                .names
                .insert(topic.id.clone(), topic.display_name().to_string());
            graph
                .prerequisites
                .insert(topic.id.clone(), topic.prerequisites.clone());
        }

        if let Some(cycle) = graph.find_cycle() {
            return Err(CatError::InvalidPathway(format!(
                "prerequisite cycle: {}",
                cycle.join(" -> ")
            )));
        }

        Ok(graph)
    }

    /// Topic ids in declaration order.
    pub fn topics(&self) -> &[String] {
        &self.order
    }

    pub fn name(&self, topic: &str) -> Option<&str> {
        self.names.get(topic).map(String::as_str)
    }

    /// Direct prerequisites of a topic.
    pub fn prerequisites(&self, topic: &str) -> &[String] {
        self.prerequisites
            .get(topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Direct and transitive prerequisites, nearest first, without duplicates.
    pub fn all_prerequisites(&self, topic: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue: VecDeque<&str> =
            self.prerequisites(topic).iter().map(String::as_str).collect();
        while let Some(next) = queue.pop_front() {
            if !seen.insert(next) {
                continue;
            }
            result.push(next.to_string());
            queue.extend(self.prerequisites(next).iter().map(String::as_str));
        }
        result
    }

    /// Depth-first search for a back edge; returns the cycle path if one exists.
    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a TopicGraph,
            topic: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(topic) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|t| *t == topic).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        stack[start..].iter().map(|t| t.to_string()).collect();
                    cycle.push(topic.to_string());
                    return Some(cycle);
                }
                None => {}
            }
            marks.insert(topic, Mark::Visiting);
            stack.push(topic);
            for prereq in graph.prerequisites(topic) {
                if let Some(cycle) = visit(graph, prereq, marks, stack) {
                    return Some(cycle);
                }
            }
            stack.pop();
            marks.insert(topic, Mark::Done);
            None
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        self.order
            .iter()
            .find_map(|topic| visit(self, topic, &mut marks, &mut stack))
    }
}

/// Placement band derived from mean mastery across topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for OverallLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallLevel::Beginner => write!(f, "Beginner"),
            OverallLevel::Intermediate => write!(f, "Intermediate"),
            OverallLevel::Advanced => write!(f, "Advanced"),
        }
    }
}

/// One topic's place in a learning pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayStep {
    pub topic: String,
    pub name: String,
    pub mastery_score: u32,
    pub level: MasteryLevel,
    /// Every prerequisite, direct or transitive, is at least partially mastered.
    pub unlocked: bool,
    /// Prerequisites still below the partial threshold.
    pub blocked_by: Vec<String>,
}

/// Ordered study plan built from placement results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPathway {
    pub steps: Vec<PathwayStep>,
    pub overall_level: OverallLevel,
    pub mean_mastery: f64,
}

impl LearningPathway {
    /// Unlocked topics that are not yet strong, weakest first.
    pub fn recommended(&self) -> Vec<&PathwayStep> {
        let mut next: Vec<&PathwayStep> = self
            .steps
            .iter()
            .filter(|s| s.unlocked && s.level != MasteryLevel::Strong)
            .collect();
        next.sort_by_key(|s| s.mastery_score);
        next
    }
}

/// Build a learning pathway over every topic of `graph`, in declaration order.
///
/// Topics without a result count as mastery 0. The overall level reuses the
/// per-topic bands (strong, partial) so `Advanced` is reachable on the 0-800 scale.
pub fn build_pathway(
    results: &[TopicResult],
    graph: &TopicGraph,
    thresholds: &MasteryThresholds,
) -> LearningPathway {
    let scores: HashMap<&str, u32> = results
        .iter()
        .map(|r| (r.topic.as_str(), r.mastery_score))
        .collect();
    let score_of = |topic: &str| scores.get(topic).copied().unwrap_or(0);

    let steps: Vec<PathwayStep> = graph
        .topics()
        .iter()
        .map(|topic| {
            let score = score_of(topic);
            let blocked_by: Vec<String> = graph
                .all_prerequisites(topic)
                .into_iter()
                .filter(|p| score_of(p) < thresholds.partial)
                .collect();
            PathwayStep {
                topic: topic.clone(),
                name: graph.name(topic).unwrap_or(topic).to_string(),
                mastery_score: score,
                level: thresholds.classify(score),
                unlocked: blocked_by.is_empty(),
                blocked_by,
            }
        })
        .collect();

    let mean_mastery = if steps.is_empty() {
        0.0
    } else {
        steps.iter().map(|s| s.mastery_score as f64).sum::<f64>() / steps.len() as f64
    };
    let overall_level = if mean_mastery >= thresholds.strong as f64 {
        OverallLevel::Advanced
    } else if mean_mastery >= thresholds.partial as f64 {
        OverallLevel::Intermediate
    } else {
        OverallLevel::Beginner
    };

    tracing::debug!(
        "pathway: {} topics, mean mastery {mean_mastery:.1}, level {overall_level}",
        steps.len()
    );

    LearningPathway {
        steps,
        overall_level,
        mean_mastery,
    }
}
