//! # Storage Module
//!
//! Handles all data persistence for the attendance portal.
//!
//! The domain layer only sees the traits in [`traits`]; the backends below
//! can be swapped through configuration without touching domain logic.
//!
//! ## Backends
//!
//! - **SQLite** (`connection` + `repositories`): SQLx pool, one repository per entity
//! - **In-memory** (`memory`): same semantics, no persistence
//! - **Change feed** (`change_feed`): push notifications for saved records
//! - **Session store** (`session_store`): durable client session key/value file
//! - **Demo data** (`seed`): sample roster for a fresh install

pub mod change_feed;
pub mod connection;
pub mod memory;
pub mod repositories;
pub mod seed;
pub mod session_store;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

pub use change_feed::{BroadcastChangeFeed, ChannelHandle, ChannelMessage, SubscribeStatus};
pub use connection::DbConnection;
pub use memory::InMemoryStorage;
pub use repositories::{AttendanceRepository, StudentRepository, SubjectRepository};
pub use session_store::{FileSessionStore, MemorySessionStore};
pub use traits::{AttendanceStorage, ChangeFeed, SessionStorage, StudentStorage, SubjectStorage};
