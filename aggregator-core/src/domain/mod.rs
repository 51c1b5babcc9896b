//! Core domain entities
//!
//! Pure data structures shared by the services - no I/O.

pub mod identity;
pub mod migration;
pub mod result;

pub use identity::{Identity, Internal, JwtPayload, Token, UserId};
pub use migration::{Direction, MigrationReport, MigrationStatus, Version};
