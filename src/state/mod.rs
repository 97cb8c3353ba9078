//! State persistence
//!
//! Storage backends, bot state partitions with typed property accessors, and
//! the memory scopes the turn orchestrator loads and saves around each turn.

pub mod bot_state;
pub mod memory_scopes;
pub mod property;
pub mod storage;

pub use bot_state::{BotState, BotStateSet, StateScope};
pub use memory_scopes::{
    BotStateMemoryScope, DialogMemoryScope, DialogStateManager, DialogStateManagerConfiguration,
    MemoryScope, TurnMemoryScope,
};
pub use property::StatePropertyAccessor;
pub use storage::{MemoryStorage, Storage};

pub(crate) use bot_state::CachedBotState;
