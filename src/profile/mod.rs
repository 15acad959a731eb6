//! Profile: the single persisted record for the user and the case subject.

pub mod model;
pub mod store;

pub use model::{Profile, ProfileUpdate, RELATIONSHIP_OPTIONS};
pub use store::ProfileStore;
