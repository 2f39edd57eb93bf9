//! Island Bridge
//!
//! Client-side bridge between a real-time voxel world and an on-chain game
//! state machine. The chain is the single source of truth; the bridge makes
//! it feel immediate by batching player actions into packed transactions,
//! applying their expected effects optimistically, and reconstructing the
//! world from confirmed chunk records.
//!
//! ## Architecture
//!
//! ```text
//! Bridge  (service.rs)          ← player intents in, confirmed records out
//!   ├── TransactionQueue  (queue.rs)     ← batching, settle, single flight
//!   │     └── encode_actions (codec.rs)  ← packed 256-bit words
//!   ├── OptimisticTracker (optimistic.rs) ← pending local effects
//!   ├── ChunkCache        (chunks.rs)     ← per-space decoded records
//!   └── SpaceManager      (space.rs)      ← actor map, space transitions
//! ```
//!
//! Timers flow through the `scheduler` seam (Tokio in production, a virtual
//! clock in tests); all drawing flows through the `render::Renderer` trait.

pub mod action;
pub mod chunks;
pub mod codec;
pub mod error;
pub mod optimistic;
pub mod protocol;
pub mod queue;
pub mod render;
pub mod scheduler;
pub mod service;
pub mod space;
pub mod types;

// Convenience re-exports
pub use action::{Action, ActionType};
pub use codec::{encode_actions, Felt};
pub use error::BridgeError;
pub use protocol::ModelUpdate;
pub use queue::{ChainSubmitter, TransactionQueue};
pub use render::{NullRenderer, Renderer};
pub use scheduler::{ManualScheduler, Scheduler, TokioScheduler};
pub use service::{Bridge, BridgeEvent};
pub use types::{BlockPos, BridgeConfig, ItemCode, SpaceKey, Vec3};
