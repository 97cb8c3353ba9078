//! Dialog orchestration engine
//!
//! This crate drives turn-based conversations. For every inbound activity it
//! decides which dialog runs, executes a possibly deep stack of nested dialogs
//! and persists the resulting state. It provides:
//! - A dialog stack with begin/continue/resume/reprompt/cancel semantics
//! - Event propagation from the innermost frame outward, across nested contexts
//! - Error recovery: failures become `error` events and the turn is retried
//!   once a frame handles them
//! - Root and skill execution modes, including remote cancellation and
//!   end-of-conversation signaling to a parent bot
//! - Conversation and user state partitions with idle expiry
//!
//! The `DialogManager` is the entry point; dialogs implement the `Dialog`
//! trait and are registered through the root dialog tree.

pub mod context;
pub mod dialogs;
pub mod error;
pub mod manager;
pub mod skills;
pub mod state;
pub mod turn;
pub mod value_objects;

// Re-export main types
pub use context::DialogContext;

pub use dialogs::{ComponentDialog, Dialog, DialogContainer, DialogSet};

pub use error::{DialogError, DialogResult};

pub use manager::{DialogManager, DialogManagerConfig, DialogManagerResult};

pub use skills::{
    EndOfConversationPolicy, SkillConversationReference, SkillEndOfConversationPolicy, TurnMode,
    is_from_parent_to_skill,
};

pub use state::{
    BotState, BotStateSet, DialogStateManager, DialogStateManagerConfiguration, MemoryScope,
    MemoryStorage, StatePropertyAccessor, StateScope, Storage,
};

pub use turn::{
    Activity, ActivitySender, ActivityType, ClaimsIdentity, EndOfConversationCode, TurnContext,
    TurnState, TurnStateKeys,
};

pub use value_objects::{
    DialogEvent, DialogEvents, DialogInstance, DialogReason, DialogState, DialogTurnResult,
    DialogTurnStatus,
};
