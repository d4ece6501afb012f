//! Quest Registry
//!
//! Loads and caches quest definitions from TOML files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::definition::QuestDefinition;

/// Registry for all quest definitions
#[derive(Debug, Default)]
pub struct QuestRegistry {
    quests: HashMap<String, Arc<QuestDefinition>>,
}

impl QuestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every quest file under `<data_dir>/quests`, returning how many loaded.
    /// Files that fail to parse or validate are skipped with a warning.
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<usize, String> {
        let quests_dir = data_dir.join("quests");
        info!("Loading quests from {:?}", quests_dir);

        if !quests_dir.exists() {
            warn!("Quest directory does not exist: {:?}", quests_dir);
            return Ok(0);
        }

        let mut paths = Vec::new();
        collect_toml_files(&quests_dir, &mut paths)?;
        paths.sort();

        let mut count = 0;
        for path in paths {
            match self.load_file(&path) {
                Ok(_) => count += 1,
                Err(e) => warn!("Failed to load quest {:?}: {}", path, e),
            }
        }

        info!("Loaded {} quest definitions", count);
        Ok(count)
    }

    /// Load a single quest file, returning the quest id
    pub fn load_file(&mut self, path: &Path) -> Result<String, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
        self.load_str(&content)
            .map_err(|e| format!("{:?}: {}", path, e))
    }

    /// Parse a `[quest]` TOML document and register it, returning the quest id
    pub fn load_str(&mut self, content: &str) -> Result<String, String> {
        let quest = QuestDefinition::from_toml_str(content)?;
        let id = quest.id.clone();
        self.store(quest);
        Ok(id)
    }

    /// Register a definition built in code
    pub fn insert(&mut self, quest: QuestDefinition) -> Result<(), String> {
        quest.validate()?;
        self.store(quest);
        Ok(())
    }

    fn store(&mut self, quest: QuestDefinition) {
        if self.quests.contains_key(&quest.id) {
            warn!("Duplicate quest ID '{}', overwriting", quest.id);
        }
        info!(
            "Loaded quest: {} ({}) - {} objectives",
            quest.title,
            quest.id,
            quest.objectives.len()
        );
        self.quests.insert(quest.id.clone(), Arc::new(quest));
    }

    /// Get a quest by ID
    pub fn get(&self, quest_id: &str) -> Option<Arc<QuestDefinition>> {
        self.quests.get(quest_id).cloned()
    }

    /// All quest IDs, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.quests.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<QuestDefinition>> {
        self.quests.values()
    }

    pub fn contains(&self, quest_id: &str) -> bool {
        self.quests.contains_key(quest_id)
    }

    pub fn len(&self) -> usize {
        self.quests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }
}

fn collect_toml_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), String> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| format!("Failed to read directory {:?}: {}", dir, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
        let path = entry.path();

        if path.is_dir() {
            collect_toml_files(&path, paths)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }

    Ok(())
}
