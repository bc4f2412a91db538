/// Question record definitions shared by every backend.
pub mod models;
/// Question bank backends and the trait they implement.
pub mod question_store;
/// Backend-agnostic storage errors.
pub mod storage;
