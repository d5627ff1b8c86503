//! Storage for users and their medicines.
//!
//! The jobs only talk to the [`MedicineStore`] trait; [`DbOperations`] is the
//! Postgres implementation used by the service.

pub mod models;
pub mod operations;

pub use models::{Medicine, User};
pub use operations::{DbOperations, DbPoolStatus, MedicineStore};
