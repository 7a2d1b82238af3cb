//! Data models

mod audit;
mod pagination;
mod problem;

pub use audit::*;
pub use pagination::*;
pub use problem::*;
