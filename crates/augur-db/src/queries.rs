//! Database query functions organized by domain.

pub mod archive;
pub mod node_state;
pub mod params;
