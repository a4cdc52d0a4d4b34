//! Domain layer: entities, lifecycle state machine, chunk sequencing,
//! ingestion dispatch, and role-specific message types.

pub mod chunks;
pub mod entities;
pub mod ingest;
pub mod messages;
pub mod state;
