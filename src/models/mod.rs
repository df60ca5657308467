//! Data models for the church hub backend.
//!
//! Field names serialize in camelCase to match the web client.

mod announcement;
mod bulletin;
mod directory;
mod life_group;
mod prayer;
mod push;
mod revision;
mod sermon;
mod service;
mod teaching;
mod user;
mod volunteer;

pub use announcement::*;
pub use bulletin::*;
pub use directory::*;
pub use life_group::*;
pub use prayer::*;
pub use push::*;
pub use revision::*;
pub use sermon::*;
pub use service::*;
pub use teaching::*;
pub use user::*;
pub use volunteer::*;
