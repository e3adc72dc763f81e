//! Domain model module declarations.

pub mod sync_state;
pub mod task;
