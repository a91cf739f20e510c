//! Core business logic - framework-agnostic pricing, drafting and commit
//! operations on top of the SeaORM entities.

pub mod actions;
pub mod bulk;
pub mod catalog;
pub mod comparison;
pub mod draft;
pub mod pricing;
pub mod project;
pub mod reconcile;
pub mod tasks;
