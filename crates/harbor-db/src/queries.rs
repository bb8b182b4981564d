//! Database query functions organized by domain.

pub mod events;
pub mod settings;
pub mod vault;
