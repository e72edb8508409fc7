//! Timeline content filter.
//!
//! Posts rendered on a timeline are fingerprinted, checked against a cache
//! of earlier verdicts, classified remotely when unseen (one request per
//! fingerprint, even across overlapping passes), and collapsed in place when
//! the verdict is "remove". Classification failures keep the post visible.

pub mod ai;
pub mod app;
pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod dom;
pub mod domain;
pub mod host;
pub mod infrastructure;
pub mod stats;
pub mod tasks;
