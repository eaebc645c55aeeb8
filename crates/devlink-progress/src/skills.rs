//! Skill tree: points, thresholds, and module unlocks
//!
//! Unlocks are user-triggered: crossing a threshold only makes a module
//! *available*; `unlock_module` commits it.

use chrono::{DateTime, Utc};
use devlink_core::TaskKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Starter module, always unlocked
pub const MODULE_GREEN: &str = "green";
pub const MODULE_FINANCE: &str = "finance";
pub const MODULE_PRODUCTIVITY: &str = "productivity";
pub const MODULE_HOMEOWNER: &str = "homeowner";

/// Points awarded for one completed task of the given kind
pub fn points_for(kind: TaskKind) -> u32 {
    match kind {
        TaskKind::Validation => 10,
        TaskKind::Computation => 5,
        TaskKind::Sync => 5,
    }
}

/// Accumulated user progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    /// Total points earned
    pub points: u32,
    /// Modules the user has committed to unlocking
    pub unlocked_modules: Vec<String>,
    /// Modules whose threshold is met but not yet committed
    pub available_unlocks: Vec<String>,
    /// Last mutation time
    pub last_updated: DateTime<Utc>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            points: 0,
            unlocked_modules: vec![MODULE_GREEN.to_string()],
            available_unlocks: Vec::new(),
            last_updated: Utc::now(),
        }
    }
}

/// Metadata for one unlockable module
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub unlock_threshold: u32,
}

/// Catalog of unlockable modules and their thresholds
pub struct ModuleCatalog {
    modules: HashMap<String, ModuleInfo>,
}

impl Default for ModuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCatalog {
    pub fn new() -> Self {
        let mut modules = HashMap::new();
        for info in [
            ModuleInfo {
                id: MODULE_GREEN.to_string(),
                name: "Green Living".to_string(),
                description: "Recycling validation and sustainable living".to_string(),
                unlock_threshold: 0,
            },
            ModuleInfo {
                id: MODULE_FINANCE.to_string(),
                name: "Finance Manager".to_string(),
                description: "Expense tracking and budget analysis".to_string(),
                unlock_threshold: 50,
            },
            ModuleInfo {
                id: MODULE_PRODUCTIVITY.to_string(),
                name: "Productivity Tools".to_string(),
                description: "Focus timers and task management".to_string(),
                unlock_threshold: 100,
            },
            ModuleInfo {
                id: MODULE_HOMEOWNER.to_string(),
                name: "Homeowner Tools".to_string(),
                description: "Energy efficiency and home projects".to_string(),
                unlock_threshold: 150,
            },
        ] {
            modules.insert(info.id.clone(), info);
        }
        Self { modules }
    }

    /// Get module metadata by ID
    pub fn get(&self, module_id: &str) -> Option<&ModuleInfo> {
        self.modules.get(module_id)
    }

    /// All modules, unordered
    pub fn all(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.values()
    }

    /// Modules reachable at the given point total
    pub fn at_threshold(&self, points: u32) -> Vec<&ModuleInfo> {
        self.modules
            .values()
            .filter(|m| m.unlock_threshold <= points)
            .collect()
    }
}

/// Points and unlock progression engine
pub struct SkillTree {
    progress: UserProgress,
    catalog: ModuleCatalog,
}

impl Default for SkillTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SkillTree {
    /// Fresh tree with default progress (starter module unlocked)
    pub fn new() -> Self {
        Self::from_progress(UserProgress::default())
    }

    /// Resume from previously saved progress
    pub fn from_progress(progress: UserProgress) -> Self {
        let mut tree = Self {
            progress,
            catalog: ModuleCatalog::new(),
        };
        tree.refresh_available();
        tree
    }

    /// Award points for a completed task and refresh available unlocks
    pub fn award_points(&mut self, points: u32) {
        self.progress.points += points;
        self.progress.last_updated = Utc::now();
        self.refresh_available();
        debug!(points = points, total = self.progress.points, "points awarded");
    }

    fn refresh_available(&mut self) {
        self.progress.available_unlocks = self
            .catalog
            .all()
            .filter(|m| {
                !self.progress.unlocked_modules.contains(&m.id)
                    && self.progress.points >= m.unlock_threshold
            })
            .map(|m| m.id.clone())
            .collect();
        self.progress.available_unlocks.sort();
    }

    /// Commit an available unlock; false if the module is not available
    pub fn unlock_module(&mut self, module_id: &str) -> bool {
        if !self
            .progress
            .available_unlocks
            .iter()
            .any(|id| id == module_id)
        {
            return false;
        }
        self.progress.unlocked_modules.push(module_id.to_string());
        self.progress
            .available_unlocks
            .retain(|id| id != module_id);
        self.progress.last_updated = Utc::now();
        true
    }

    /// Whether a module has been committed
    pub fn is_unlocked(&self, module_id: &str) -> bool {
        self.progress
            .unlocked_modules
            .iter()
            .any(|id| id == module_id)
    }

    /// Current progress snapshot
    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    /// Points still needed for the cheapest locked module, or None when
    /// everything is unlocked
    pub fn points_until_next_unlock(&self) -> Option<u32> {
        self.catalog
            .all()
            .filter(|m| !self.progress.unlocked_modules.contains(&m.id))
            .map(|m| m.unlock_threshold.saturating_sub(self.progress.points))
            .min()
    }
}
