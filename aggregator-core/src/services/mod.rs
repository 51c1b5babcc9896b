//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and adapter interactions. Each service
//! focuses on a specific use case or feature area.

pub mod auth;
mod doctor;
pub mod migration;

pub use auth::AuthService;
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use migration::{Migration, Migrator, Step, StepFn};
