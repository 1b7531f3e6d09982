//! Request handlers for resource operations.

mod resources;

pub use resources::*;
