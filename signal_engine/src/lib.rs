//! Technical signal engine.
//!
//! Bars flow through [`enrich`] into [`signals`], are reduced to a single
//! [`decision::Decision`], and are persisted by the [`runner`] through an
//! [`sink::AnalysisSink`]. The [`correlator`] joins an earnings calendar with
//! order-flow lookups under a concurrency cap.

pub mod calendar;
pub mod config;
pub mod correlator;
pub mod db;
pub mod decision;
pub mod enrich;
pub mod models;
pub mod runner;
pub mod schema;
pub mod signals;
pub mod sink;
pub mod store;
pub mod tz;
