//! Register synchronisation for the Plateypus vehicle index.
//!
//! Responsibilities:
//! - Locate and download national register dumps ([`remote`]).
//! - Stream dumps into vehicle records and load them ([`etl`]).
//!
//! Boundaries:
//! - Search and storage semantics live in `plateypus-core`.
//! - Filesystem access goes through `plateypus-fs`.
//!
//! Invariants:
//! - A country's watermark only advances after its vehicles are replaced.
//! - No global mutable state.
#![forbid(unsafe_code)]

pub mod etl;
pub mod remote;
