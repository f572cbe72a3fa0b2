//! The `adaptest simulate` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use adaptest_core::config::load_config_from;
use adaptest_core::parser;
use adaptest_core::report::{SimulationReport, SimulationRun};
use adaptest_core::simulation::{SimulationReporter, Simulator};

/// Console progress reporter.
struct ConsoleReporter;

impl SimulationReporter for ConsoleReporter {
    fn on_run_complete(&self, run: &SimulationRun) {
        let stop = run
            .results
            .stop_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".into());
        tracing::debug!(
            "run theta={:+.2} #{}: {} items, mean mastery {:.0}, {stop}",
            run.true_theta,
            run.replication,
            run.results.total_answered,
            run.results.mean_mastery()
        );
    }

    fn on_run_error(&self, true_theta: f64, replication: u32, error: &str) {
        eprintln!("  ERROR: theta={true_theta:+.2} #{replication}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "Complete: {completed}/{total} sessions, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(
    catalog_path: PathBuf,
    theta_str: String,
    replications: Option<u32>,
    seed: Option<u64>,
    parallelism: Option<usize>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
    format: String,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let thetas = parse_thetas(&theta_str)?;
    let replications = replications.unwrap_or(config.simulation.replications);
    let seed = seed.unwrap_or(config.simulation.seed);
    let parallelism = parallelism.unwrap_or(config.simulation.parallelism);
    let output = output.unwrap_or_else(|| config.output_dir.clone());

    anyhow::ensure!(replications >= 1, "replications must be at least 1");
    anyhow::ensure!(parallelism >= 1, "parallelism must be at least 1");

    let catalog = parser::parse_catalog(&catalog_path, &config.engine)?;
    eprintln!(
        "Simulating {} x {replications} sessions on '{}' ({} items, {} topics)",
        thetas.len(),
        catalog.info().name,
        catalog.len(),
        catalog.topics().len()
    );

    let simulator = Simulator::new(Arc::new(catalog), config.engine.clone(), parallelism);
    let report = simulator
        .run_batch(&thetas, replications, seed, &ConsoleReporter)
        .await?;

    match format.as_str() {
        "markdown" | "md" => println!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&report.summaries)?),
        _ => print_summary(&report),
    }

    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let path = output.join(format!("simulation-{timestamp}.json"));
    report.save_json(&path)?;
    println!("Results saved to: {}", path.display());

    Ok(())
}

fn parse_thetas(s: &str) -> Result<Vec<f64>> {
    let thetas = s
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| -> Result<f64> {
            let value: f64 = t
                .parse()
                .with_context(|| format!("invalid theta value: '{t}'"))?;
            anyhow::ensure!(value.is_finite(), "theta must be finite, got '{t}'");
            Ok(value)
        })
        .collect::<Result<Vec<_>>>()?;
    anyhow::ensure!(!thetas.is_empty(), "at least one theta is required");
    Ok(thetas)
}

fn print_summary(report: &SimulationReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["True θ", "Runs", "Bias", "RMSE", "Items", "Mean SE"]);

    for s in &report.summaries {
        table.add_row(vec![
            Cell::new(format!("{:+.2}", s.true_theta)),
            Cell::new(s.runs),
            Cell::new(format!("{:+.3}", s.bias)),
            Cell::new(format!("{:.3}", s.rmse)),
            Cell::new(format!("{:.1}", s.mean_items)),
            Cell::new(format!("{:.3}", s.mean_standard_error)),
        ]);
    }

    println!("{table}");
}
