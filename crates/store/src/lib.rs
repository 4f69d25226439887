//! Concrete `Store` implementations (§10.3): `RedisStore` for production,
//! `InMemoryStore` for tests and local runs without Redis.

pub mod memory;
pub mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;
