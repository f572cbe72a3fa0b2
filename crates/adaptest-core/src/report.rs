//! Placement results and simulation reports with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CatConfig;
use crate::mastery::MasteryLevel;
use crate::model::{ItemCatalog, SessionStatus};
use crate::termination::StopReason;

/// Final standing of one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicResult {
    pub topic: String,
    pub theta: f64,
    pub standard_error: f64,
    /// Ability on the reporting scale (0 to 800).
    pub mastery_score: u32,
    pub level: MasteryLevel,
    pub num_answered: u32,
    pub num_correct: u32,
    /// `num_correct / num_answered`, 0 when nothing was answered.
    pub correct_ratio: f64,
}

/// Outcome of a finished (or snapshot of an unfinished) placement session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementResults {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stop_reason: Option<StopReason>,
    pub total_answered: u32,
    pub topics: Vec<TopicResult>,
}

impl PlacementResults {
    pub fn topic(&self, id: &str) -> Option<&TopicResult> {
        self.topics.iter().find(|t| t.topic == id)
    }

    /// Mean mastery score across topics.
    pub fn mean_mastery(&self) -> f64 {
        if self.topics.is_empty() {
            return 0.0;
        }
        self.topics.iter().map(|t| t.mastery_score as f64).sum::<f64>() / self.topics.len() as f64
    }
}

/// One simulated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRun {
    /// Ability the simulated examinee answers from, in every topic.
    pub true_theta: f64,
    pub replication: u32,
    pub seed: u64,
    pub results: PlacementResults,
}

impl SimulationRun {
    /// Estimation errors `theta_hat - true_theta`, one per topic.
    pub fn errors(&self) -> impl Iterator<Item = f64> + '_ {
        self.results
            .topics
            .iter()
            .map(move |t| t.theta - self.true_theta)
    }
}

/// Recovery statistics for one true ability level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThetaSummary {
    pub true_theta: f64,
    pub runs: usize,
    /// Mean signed estimation error.
    pub bias: f64,
    /// Root mean squared estimation error.
    pub rmse: f64,
    pub mean_items: f64,
    pub mean_standard_error: f64,
}

/// Catalog header without the item bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSummary {
    pub id: String,
    pub name: String,
    pub item_count: usize,
    pub topic_count: usize,
}

impl CatalogSummary {
    pub fn from_catalog(catalog: &ItemCatalog) -> Self {
        Self {
            id: catalog.info().id.clone(),
            name: catalog.info().name.clone(),
            item_count: catalog.len(),
            topic_count: catalog.topics().len(),
        }
    }
}

/// A complete simulation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub catalog: CatalogSummary,
    /// Engine constants the batch ran with.
    pub engine: CatConfig,
    pub runs: Vec<SimulationRun>,
    pub summaries: Vec<ThetaSummary>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl SimulationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SimulationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the per-theta summary as a markdown table.
    pub fn to_markdown(&self) -> String {
        let mut md = format!(
            "**{}**: {} runs over {} items in {} topics\n\n",
            self.catalog.name,
            self.runs.len(),
            self.catalog.item_count,
            self.catalog.topic_count
        );
        md.push_str("| True θ | Runs | Bias | RMSE | Items | SE |\n");
        md.push_str("|--------|------|------|------|-------|----|\n");
        for s in &self.summaries {
            md.push_str(&format!(
                "| {:+.2} | {} | {:+.3} | {:.3} | {:.1} | {:.3} |\n",
                s.true_theta, s.runs, s.bias, s.rmse, s.mean_items, s.mean_standard_error
            ));
        }
        md
    }
}

/// Group runs by true theta (ascending) and compute recovery statistics.
pub fn summarize(runs: &[SimulationRun]) -> Vec<ThetaSummary> {
    let mut levels: Vec<f64> = runs.iter().map(|r| r.true_theta).collect();
    levels.sort_by(f64::total_cmp);
    levels.dedup();

    levels
        .into_iter()
        .map(|true_theta| {
            let group: Vec<&SimulationRun> =
                runs.iter().filter(|r| r.true_theta == true_theta).collect();
            let errors: Vec<f64> = group.iter().flat_map(|r| r.errors()).collect();
            let standard_errors: Vec<f64> = group
                .iter()
                .flat_map(|r| r.results.topics.iter().map(|t| t.standard_error))
                .collect();
            let items: Vec<f64> = group
                .iter()
                .map(|r| r.results.total_answered as f64)
                .collect();

            ThetaSummary {
                true_theta,
                runs: group.len(),
                bias: mean(&errors),
                rmse: mean(&errors.iter().map(|e| e * e).collect::<Vec<_>>()).sqrt(),
                mean_items: mean(&items),
                mean_standard_error: mean(&standard_errors),
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_result(topic: &str, theta: f64, se: f64) -> TopicResult {
        TopicResult {
            topic: topic.into(),
            theta,
            standard_error: se,
            mastery_score: crate::mastery::mastery_score(theta, 800),
            level: MasteryLevel::Partial,
            num_answered: 4,
            num_correct: 2,
            correct_ratio: 0.5,
        }
    }

    fn make_run(true_theta: f64, replication: u32, estimates: &[(f64, f64)], items: u32) -> SimulationRun {
        SimulationRun {
            true_theta,
            replication,
            seed: replication as u64,
            results: PlacementResults {
                session_id: Uuid::nil(),
                status: SessionStatus::Completed,
                started_at: Utc::now(),
                completed_at: Some(Utc::now()),
                stop_reason: Some(StopReason::RelaxedPrecision),
                total_answered: items,
                topics: estimates
                    .iter()
                    .enumerate()
                    .map(|(i, &(theta, se))| topic_result(&format!("t{i}"), theta, se))
                    .collect(),
            },
        }
    }

    fn make_report(runs: Vec<SimulationRun>) -> SimulationReport {
        SimulationReport {
            id: Uuid::nil(),
            created_at: Utc::now(),
            catalog: CatalogSummary {
                id: "test".into(),
                name: "Test".into(),
                item_count: 10,
                topic_count: 2,
            },
            engine: CatConfig::default(),
            summaries: summarize(&runs),
            runs,
            duration_ms: 0,
        }
    }

    #[test]
    fn summary_bias_and_rmse() {
        let runs = vec![
            make_run(1.0, 0, &[(1.5, 0.3), (0.5, 0.5)], 10),
            make_run(1.0, 1, &[(2.0, 0.4), (1.0, 0.4)], 14),
        ];
        let summaries = summarize(&runs);
        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.runs, 2);
        // Errors: 0.5, -0.5, 1.0, 0.0
        assert!((s.bias - 0.25).abs() < 1e-12);
        assert!((s.rmse - (1.5f64 / 4.0).sqrt()).abs() < 1e-12);
        assert!((s.mean_items - 12.0).abs() < 1e-12);
        assert!((s.mean_standard_error - 0.4).abs() < 1e-12);
    }

    #[test]
    fn summaries_sorted_by_theta() {
        let runs = vec![
            make_run(1.0, 0, &[(1.0, 0.3)], 8),
            make_run(-1.0, 0, &[(-1.0, 0.3)], 8),
            make_run(0.0, 0, &[(0.2, 0.3)], 8),
        ];
        let levels: Vec<f64> = summarize(&runs).iter().map(|s| s.true_theta).collect();
        assert_eq!(levels, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report(vec![make_run(0.0, 0, &[(0.1, 0.3), (-0.2, 0.35)], 9)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = SimulationReport::load_json(&path).unwrap();

        assert_eq!(loaded.catalog.id, "test");
        assert_eq!(loaded.runs.len(), 1);
        assert_eq!(loaded.runs[0].results.topics.len(), 2);
        assert_eq!(
            loaded.runs[0].results.stop_reason,
            Some(StopReason::RelaxedPrecision)
        );
    }

    #[test]
    fn load_missing_file_fails_with_path() {
        let err = SimulationReport::load_json(Path::new("/nonexistent/report.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/report.json"));
    }

    #[test]
    fn markdown_lists_every_level() {
        let report = make_report(vec![
            make_run(-1.0, 0, &[(-0.8, 0.3)], 8),
            make_run(1.0, 0, &[(1.1, 0.3)], 8),
        ]);
        let md = report.to_markdown();
        assert!(md.contains("| -1.00 |"));
        assert!(md.contains("| +1.00 |"));
    }

    #[test]
    fn mean_mastery_of_empty_results_is_zero() {
        let results = make_run(0.0, 0, &[], 0).results;
        assert_eq!(results.mean_mastery(), 0.0);
        assert!(results.topic("t0").is_none());
    }
}
