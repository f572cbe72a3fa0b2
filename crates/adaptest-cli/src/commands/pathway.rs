//! The `adaptest pathway` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use adaptest_core::config::CatConfig;
use adaptest_core::mastery::MasteryThresholds;
use adaptest_core::parser;
use adaptest_core::pathway::build_pathway;
use adaptest_core::report::SimulationReport;

pub fn execute(catalog_path: PathBuf, report_path: PathBuf, run_index: usize) -> Result<()> {
    let report = SimulationReport::load_json(&report_path)?;
    let run = report.runs.get(run_index).ok_or_else(|| {
        anyhow::anyhow!(
            "run {run_index} not found, report has {} runs",
            report.runs.len()
        )
    })?;

    let engine: &CatConfig = &report.engine;
    let catalog = parser::parse_catalog(&catalog_path, engine)?;
    if catalog.info().id != report.catalog.id {
        tracing::warn!(
            "report was produced from catalog '{}', not '{}'",
            report.catalog.id,
            catalog.info().id
        );
    }

    let pathway = build_pathway(
        &run.results.topics,
        catalog.graph(),
        &MasteryThresholds::default(),
    );

    println!(
        "Run {run_index}: true theta {:+.2}, {} items answered",
        run.true_theta, run.results.total_answered
    );

    let mut table = Table::new();
    table.set_header(vec!["Topic", "Mastery", "Level", "Status"]);
    for step in &pathway.steps {
        let status = if step.unlocked {
            "unlocked".to_string()
        } else {
            format!("needs {}", step.blocked_by.join(", "))
        };
        table.add_row(vec![
            Cell::new(&step.name),
            Cell::new(step.mastery_score),
            Cell::new(step.level),
            Cell::new(status),
        ]);
    }
    println!("{table}");

    println!(
        "Overall level: {} (mean mastery {:.0})",
        pathway.overall_level, pathway.mean_mastery
    );

    let next = pathway.recommended();
    if next.is_empty() {
        println!("Nothing left to study.");
    } else {
        let names: Vec<&str> = next.iter().map(|s| s.name.as_str()).collect();
        println!("Study next: {}", names.join(", "));
    }

    Ok(())
}
