// src/memory/mod.rs — Persistent store for users, sessions, turns and survey data

pub mod schema;
pub mod store;
pub mod store_server;

pub use store::{ConsentedSessionRow, DemographicsRow, Store};
pub use store_server::{spawn_store_server, StoreHandle};
