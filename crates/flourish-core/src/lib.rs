//! Core types and rules for the Flourish child enrollment system.
//!
//! This crate has no database or CLI dependencies. It holds the domain
//! records, the cohort rule table, change detection for follow-up forms,
//! assent projection, and the [`store::EnrollmentStore`] trait that storage
//! backends implement.

// Native `async fn` in traits; see `store.rs`.
#![allow(async_fn_in_trait)]

pub mod age;
pub mod assent;
pub mod choices;
pub mod cohort;
pub mod consent;
pub mod dataset;
pub mod error;
pub mod feeding;
pub mod schedule;
pub mod store;
pub mod tracked;
pub mod validation;
pub mod visit;

pub use error::{Error, Result};
