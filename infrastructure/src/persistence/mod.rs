pub mod firebase_repository;
pub mod in_memory_repository;

// Re-export both storage backends
pub use firebase_repository::{FirebaseConfig, FirebaseStorage};
pub use in_memory_repository::InMemoryStorage;
