//! HTTP handlers. Each one extracts input, delegates to a service and maps
//! the outcome to a response; no storage logic lives here.

pub mod convert_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod song_handlers;
pub mod upload_handlers;
