//! The `adaptest validate` command.

use std::path::PathBuf;

use anyhow::Result;

use adaptest_core::config::load_config_from;
use adaptest_core::parser;

pub fn execute(catalog_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let catalogs = if catalog_path.is_dir() {
        parser::load_catalog_directory(&catalog_path, &config.engine)?
    } else {
        vec![parser::parse_catalog(&catalog_path, &config.engine)?]
    };

    anyhow::ensure!(
        !catalogs.is_empty(),
        "no valid catalogs found in {}",
        catalog_path.display()
    );

    let mut total_warnings = 0;

    for catalog in &catalogs {
        println!(
            "Catalog: {} ({} items, {} topics)",
            catalog.info().name,
            catalog.len(),
            catalog.topics().len()
        );

        let warnings = parser::validate_catalog(catalog, &config.engine);
        for w in &warnings {
            let prefix = match (&w.topic, &w.item_id) {
                (_, Some(item)) => format!("  [{item}]"),
                (Some(topic), None) => format!("  [{topic}]"),
                (None, None) => "  ".to_string(),
            };
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All catalogs valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
