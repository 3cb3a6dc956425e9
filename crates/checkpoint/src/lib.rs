//! # larder-checkpoint
//!
//! Persisted model snapshots and their binary wire format.
//!
//! A [`ModelCheckpoint`] is everything needed to resume filtering an
//! item exactly: parameters, last posterior state, rolling statistics,
//! and versioning metadata. The envelope is a little-endian binary
//! layout with a magic prefix, a schema version, and a CRC32 trailer.
//! Unknown bytes between the known fields and the trailer are ignored on
//! read (forward compatibility); writes never emit them.

mod checkpoint;
mod envelope;
mod error;

pub use checkpoint::{CheckpointOwner, ModelCheckpoint};
pub use envelope::{decode, encode, SCHEMA_VERSION};
pub use error::CheckpointError;
