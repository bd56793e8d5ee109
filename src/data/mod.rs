//! Data ingestion
//!
//! Loads historical hourly observation tables and prepares them for
//! training: timestamp ordering, imputation, and derived feature columns.

pub mod observations;

pub use observations::ObservationTable;
