use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use questline::quest::QuestDefinition;
use questline::{Progression, ProgressionConfig, ProgressionEvent, QuestRegistry, QuestStatus};

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let simulate = args.iter().any(|a| a == "--simulate");
    let config_path = args.iter().find(|a| !a.starts_with("--"));

    let config = match config_path {
        Some(path) => match ProgressionConfig::load(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ProgressionConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let mut registry = QuestRegistry::new();
    if let Err(e) = registry.load_from_directory(&config.data_dir) {
        error!("Failed to load quest registry: {}", e);
        return ExitCode::FAILURE;
    }
    if registry.is_empty() {
        warn!("No quests found in {:?}", config.data_dir);
    }

    for id in registry.ids() {
        if let Some(quest) = registry.get(&id) {
            log_summary(&quest);
        }
    }

    if simulate && !run_simulation(Arc::new(registry), &config) {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn log_summary(quest: &QuestDefinition) {
    let tasks: usize = quest.objectives.iter().map(|o| o.tasks.len()).sum();
    info!(
        "{} ({}): {} objectives, {} tasks, branches {:?}",
        quest.title,
        quest.id,
        quest.objectives.len(),
        tasks,
        quest.branches()
    );
}

// ============================================================================
// Simulation
// ============================================================================

/// Accept every quest and play it through, returning whether all completed
fn run_simulation(registry: Arc<QuestRegistry>, config: &ProgressionConfig) -> bool {
    let mut progression = Progression::new(registry, config);
    progression.add_listener(|event: &ProgressionEvent| match serde_json::to_string(event) {
        Ok(line) => info!(target: "questline::events", "{}", line),
        Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
    });

    // Gated barriers would otherwise hold forever
    for gate in gate_names(progression.registry(), config) {
        progression.set_gate_open(&gate, true);
    }

    let mut all_completed = true;
    for quest_id in progression.registry().ids() {
        progression.accept_quest(&quest_id);

        let mut ticks = 0;
        while !progression.quest_status(&quest_id).is_resolved() && ticks < config.max_ticks {
            drive_current_objective(&mut progression, &quest_id);
            progression.tick(config.tick_interval);
            ticks += 1;
        }

        let status = progression.quest_status(&quest_id);
        info!("Quest '{}' ended {} after {} ticks", quest_id, status.as_str(), ticks);
        if status != QuestStatus::Completed {
            all_completed = false;
        }
    }
    all_completed
}

/// Push every visible, unresolved mandatory task of the current objective to its target
fn drive_current_objective(progression: &mut Progression, quest_id: &str) {
    let pending: Vec<(String, i32)> = progression
        .quest(quest_id)
        .and_then(|quest| quest.current_objective())
        .map(|objective| {
            objective
                .tasks()
                .iter()
                .filter(|t| t.is_mandatory() && !t.is_hidden() && !t.status().is_resolved())
                .map(|t| (t.id().to_string(), t.number_outstanding()))
                .collect()
        })
        .unwrap_or_default();

    for (task_id, outstanding) in pending {
        progression.progress_task(quest_id, &task_id, outstanding);
    }
}

fn gate_names(registry: &QuestRegistry, config: &ProgressionConfig) -> BTreeSet<String> {
    let mut gates = BTreeSet::new();
    if !config.default_barrier.gate.is_empty() {
        gates.insert(config.default_barrier.gate.clone());
    }
    for quest in registry.all() {
        for objective in &quest.objectives {
            for task in &objective.tasks {
                if let Some(barrier) = task.barrier.as_ref().filter(|b| !b.gate.is_empty()) {
                    gates.insert(barrier.gate.clone());
                }
            }
        }
    }
    gates
}
