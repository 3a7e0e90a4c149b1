//! API route modules

pub mod evaluators;
pub mod health;
pub mod projects;
pub mod spans;
pub mod traces;
