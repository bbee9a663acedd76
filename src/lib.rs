//! # tmap
//!
//! Concurrent maps whose entries remove themselves.
//!
//! - [`TMap`] expires entries after a lifetime, per store or by default.
//! - [`ScopeMap`] expires entries when a caller-supplied [`Scope`] is
//!   cancelled or reaches its deadline.
//!
//! There is no sweeper thread. Each temporary entry is watched by its own
//! Tokio task, which races the entry's trigger against a stop signal. Stores
//! and deletes stop the previous watcher for a key before anything else
//! happens to it, so a replaced value is never removed by a stale watcher,
//! and a delete is visible as soon as it returns.

mod config;
mod error;
mod lifecycle;
pub mod lifetime;
mod scope;
mod scope_map;
mod store;
mod tmap;
mod watcher;

pub use config::TMapConfig;
pub use error::{LifetimeError, TMapError};
pub use scope::{Scope, ScopeError};
pub use scope_map::ScopeMap;
pub use tmap::TMap;
