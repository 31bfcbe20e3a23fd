//! Session-store adapters and the in-memory service double used by flow
//! tests.

pub mod memory;
pub mod mock_services;
pub mod postgres;

pub use memory::MemorySessionStore;
pub use mock_services::MockServices;
pub use postgres::PgSessionStore;
