//! Business logic services

pub mod audit;
pub mod seeder;

pub use audit::AuditService;
pub use seeder::seed_if_empty;
