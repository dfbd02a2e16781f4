//! Core data models for the song catalogue.
//!
//! `SongRecord` maps to the `songs` table via `sqlx::FromRow` and serializes
//! as JSON via `serde`. `ObjectSummary` describes a raw object in the store.

pub mod object;
pub mod song;
