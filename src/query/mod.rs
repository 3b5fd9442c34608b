//! Query cache layer: keyed server data shared across views.

mod cache;
mod key;
mod state;

pub use cache::{CacheOptions, QueryCache, Subscription};
pub use key::{KeyMatch, Mutation, QueryKey};
pub use state::{Query, QueryState};
