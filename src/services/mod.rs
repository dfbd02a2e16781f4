//! Storage adapters and the orchestration built on top of them.

pub mod convert_service;
pub mod object_store;
pub mod song_repository;
pub mod song_service;
