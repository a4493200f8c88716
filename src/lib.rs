//! readme-sync: copies README content from locally cloned source
//! repositories into the documentation tree and repairs image references
//! that no longer resolve from their new location.
//!
//! Pipeline, leaf-first: [`load_config`] parses the declarative mapping file,
//! [`transform`] stamps each page with a provenance banner, [`images`]
//! resolves broken image references against the repository clones, and
//! [`synchronise`] drives the whole run and accumulates the
//! [`synchronise::SyncReport`] the CLI prints.

pub mod cli;
pub mod error;
pub mod images;
pub mod load_config;
pub mod synchronise;
pub mod transform;
