//! Keyword-driven question answering over a table of student exam results.
//!
//! A [`store::RecordTable`] is loaded once from CSV and shared read-only
//! with an [`aggregator::Aggregator`], which classifies each query and
//! computes the matching [`models::QueryResult`] for a presenter to render.

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod models;
pub mod report;
pub mod store;
