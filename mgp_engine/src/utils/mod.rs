/// Utility containers shared by the engine caches

pub mod lru_cache;

pub use lru_cache::LruCache;
