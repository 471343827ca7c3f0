//! Database Seeding
//!
//! Seeders are plain units of data setup run in declaration order, gated by
//! environment. Nothing records which seeders ran.

pub mod runner;
pub mod seeder;

pub use runner::{SeedFailure, SeedFailurePolicy, SeedRunResult, SeedRunner};
pub use seeder::{CustomSeeder, Environment, Seeder};
