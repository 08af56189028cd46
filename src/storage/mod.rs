//! `SQLite` persistence for baseline records.
//!
//! Records are stored as JSON artifacts alongside a few indexed summary
//! columns, so a later session can reload a baseline instead of
//! re-measuring.

mod baselines;
mod core;
mod trait_impl;

pub use self::core::SqliteBaselineStore;
