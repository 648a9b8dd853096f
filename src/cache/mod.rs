//! Cache Consistency Layer.
//!
//! A client-side store of server data keyed by [`QueryKey`]. Fresh values are
//! served without contacting the gateway, each key has at most one fetch in
//! flight, and successful mutations mark dependent resources stale through the
//! static invalidation graph.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod invalidation;
pub mod key;
pub mod models;
pub mod policy;
pub mod store;

pub use invalidation::{Mutation, PushEvent};
pub use key::{QueryKey, Resource};
pub use models::{CacheStats, EntryState};
pub use policy::{PolicyTable, QueryPolicy};
pub use store::{FetchAborted, QueryCache};
