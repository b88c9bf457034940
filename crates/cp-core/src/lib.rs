//! Core types and storage for clonepairs.
//!
//! Provides the patch-pair data model ([`model::PatchPair`], [`model::BugKey`],
//! [`model::ModifiedMethod`]), run configuration, and CSV persistence for the
//! `uid, groundtruth_index, expert_label` schema.

pub mod config;
pub mod model;
pub mod storage;
