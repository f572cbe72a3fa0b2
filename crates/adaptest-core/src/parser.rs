//! TOML item catalog parser.
//!
//! Loads item catalogs from TOML files and directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::CatConfig;
use crate::model::{CatalogInfo, Item, ItemCatalog, Topic};

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    catalog: TomlCatalogHeader,
    #[serde(default)]
    topics: Vec<TomlTopic>,
    #[serde(default)]
    items: Vec<TomlItem>,
}

#[derive(Debug, Deserialize)]
struct TomlCatalogHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlTopic {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    prerequisites: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlItem {
    id: String,
    topic: String,
    #[serde(default = "default_discrimination")]
    discrimination: f64,
    difficulty: f64,
    #[serde(default)]
    guessing: Option<f64>,
    #[serde(default)]
    slip: Option<f64>,
    #[serde(default)]
    content: String,
}

fn default_discrimination() -> f64 {
    1.0
}

/// Parse a single TOML file into an `ItemCatalog`.
pub fn parse_catalog(path: &Path, config: &CatConfig) -> Result<ItemCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path, config)
}

/// Parse a TOML string into an `ItemCatalog` (useful for testing).
pub fn parse_catalog_str(
    content: &str,
    source_path: &Path,
    config: &CatConfig,
) -> Result<ItemCatalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let info = CatalogInfo {
        id: parsed.catalog.id,
        name: parsed.catalog.name,
        description: parsed.catalog.description,
    };

    let topics = parsed
        .topics
        .into_iter()
        .map(|t| Topic {
            name: if t.name.trim().is_empty() {
                t.id.clone()
            } else {
                t.name
            },
            id: t.id,
            prerequisites: t.prerequisites,
        })
        .collect();

    let items = parsed
        .items
        .into_iter()
        .map(|i| Item {
            id: i.id,
            topic: i.topic,
            discrimination: i.discrimination,
            difficulty: i.difficulty,
            guessing: i.guessing,
            slip: i.slip,
            content: i.content,
        })
        .collect();

    ItemCatalog::new(info, topics, items, config)
        .with_context(|| format!("invalid catalog: {}", source_path.display()))
}

/// Recursively load all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path, config: &CatConfig) -> Result<Vec<ItemCatalog>> {
    let mut catalogs = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            catalogs.extend(load_catalog_directory(&path, config)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path, config) {
                Ok(catalog) => catalogs.push(catalog),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(catalogs)
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The topic concerned (if applicable).
    pub topic: Option<String>,
    /// The item concerned (if applicable).
    pub item_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check a catalog for content problems that do not prevent testing.
pub fn validate_catalog(catalog: &ItemCatalog, config: &CatConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for topic in catalog.topics() {
        let count = catalog.topic_item_count(&topic.id);
        if count == 0 {
            warnings.push(ValidationWarning {
                topic: Some(topic.id.clone()),
                item_id: None,
                message: "topic has no items".into(),
            });
        } else if count < config.min_questions_per_topic as usize {
            warnings.push(ValidationWarning {
                topic: Some(topic.id.clone()),
                item_id: None,
                message: format!(
                    "topic has {count} items, fewer than the {} needed for coverage",
                    config.min_questions_per_topic
                ),
            });
        }
        if topic.name.trim().is_empty() {
            warnings.push(ValidationWarning {
                topic: Some(topic.id.clone()),
                item_id: None,
                message: "topic is not declared in [[topics]]".into(),
            });
        }
    }

    for item in catalog.items() {
        if item.guessing.is_none() {
            warnings.push(ValidationWarning {
                topic: Some(item.topic.clone()),
                item_id: Some(item.id.clone()),
                message: format!(
                    "no guessing parameter, using default {}",
                    config.default_guessing
                ),
            });
        }
    }

    let mut difficulties = HashSet::new();
    for topic in catalog.topics() {
        difficulties.clear();
        for item in catalog.items_in_topic(&topic.id) {
            difficulties.insert(item.difficulty.to_bits());
        }
        if difficulties.len() == 1 && catalog.topic_item_count(&topic.id) > 1 {
            warnings.push(ValidationWarning {
                topic: Some(topic.id.clone()),
                item_id: None,
                message: "every item has the same difficulty".into(),
            });
        }
    }

    warnings
}
