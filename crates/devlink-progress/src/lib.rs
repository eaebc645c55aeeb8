//! devlink Progress - Points, unlocks, and persistence
//!
//! Task completions award points; accumulated points unlock feature
//! modules. Persistence goes through a pluggable [`StorageAdapter`]
//! (in-memory for tests, one JSON file per key under the user config
//! dir by default).

pub mod skills;
pub mod store;

pub use skills::{points_for, ModuleCatalog, ModuleInfo, SkillTree, UserProgress};
pub use store::{
    FileAdapter, MemoryAdapter, ProgressStore, StorageAdapter, StorageError, StorageResult,
};
