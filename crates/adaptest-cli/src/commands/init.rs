//! The `adaptest init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("adaptest.toml").exists() {
        println!("adaptest.toml already exists, skipping.");
    } else {
        std::fs::write("adaptest.toml", SAMPLE_CONFIG)?;
        println!("Created adaptest.toml");
    }

    std::fs::create_dir_all("catalogs")?;
    let example_path = Path::new("catalogs/example.toml");
    if example_path.exists() {
        println!("catalogs/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CATALOG)?;
        println!("Created catalogs/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Add items with calibrated parameters to catalogs/example.toml");
    println!("  2. Run: adaptest validate --catalog catalogs/example.toml");
    println!("  3. Run: adaptest simulate --catalog catalogs/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# adaptest configuration

output_dir = "./adaptest-results"

[engine]
max_questions_total = 40
min_questions_per_topic = 3
max_questions_per_topic = 12
standard_error_threshold = 0.3
slip = 0.05
default_guessing = 0.25
refresh_all_topics = true

[simulation]
replications = 20
seed = 42
parallelism = 4
"#;

const EXAMPLE_CATALOG: &str = r#"[catalog]
id = "example"
name = "Example Catalog"
description = "A small catalog to get started"

[[topics]]
id = "fractions"
name = "Fractions"

[[topics]]
id = "ratios"
name = "Ratios"
prerequisites = ["fractions"]

[[items]]
id = "fr-1"
topic = "fractions"
discrimination = 1.0
difficulty = -1.5
guessing = 0.25
content = "Which is larger, 1/2 or 1/3?"

[[items]]
id = "fr-2"
topic = "fractions"
discrimination = 1.2
difficulty = -0.5
guessing = 0.25
content = "What is 1/4 + 1/4?"

[[items]]
id = "fr-3"
topic = "fractions"
discrimination = 1.4
difficulty = 0.3
guessing = 0.2
content = "What is 2/3 of 9?"

[[items]]
id = "fr-4"
topic = "fractions"
discrimination = 1.1
difficulty = 1.2
guessing = 0.2
content = "Simplify 18/24."

[[items]]
id = "ra-1"
topic = "ratios"
discrimination = 0.9
difficulty = -1.0
guessing = 0.25
content = "Write 2:4 in simplest form."

[[items]]
id = "ra-2"
topic = "ratios"
discrimination = 1.3
difficulty = 0.0
guessing = 0.25
content = "Split 30 in the ratio 1:2."

[[items]]
id = "ra-3"
topic = "ratios"
discrimination = 1.5
difficulty = 0.8
guessing = 0.2
content = "A map uses 1:50000. How far is 3 cm on the map?"

[[items]]
id = "ra-4"
topic = "ratios"
discrimination = 1.0
difficulty = 1.8
guessing = 0.2
content = "If a:b = 3:5 and b:c = 2:7, find a:c."
"#;
