//! Policy module - Which settings keys may be submitted in a patch.

mod config;
mod policy;

pub use config::*;
pub use policy::*;
