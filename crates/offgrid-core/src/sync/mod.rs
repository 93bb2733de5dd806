//! Store-and-forward exchange between devices
//!
//! ## Overview
//!
//! Devices never talk to each other directly. One device exports a
//! [`Bundle`] as a text string, the string travels by whatever means is at
//! hand, and another device imports it. Every import can make the importer
//! a relay for the messages it did not know about.
//!
//! ```text
//! A ──export──▶ "eyJmcm9tIjoi..." ──carried──▶ B ──import──▶ merge
//!                                                 │
//!                                                 └──export──▶ C ...
//! ```
//!
//! - [`bundle`]: the wire format and what goes into an export
//! - [`merge`]: how an imported bundle lands in the local store

pub mod bundle;
pub mod merge;

pub use bundle::{is_export_eligible, select_for_export, Bundle};
pub use merge::{merge_bundle, prepare_incoming, MergeReport};
