//! Route compilation for registered resources.

pub mod resources;

pub use resources::{resource_routes, run_wrapped, BACK_BUTTON};
