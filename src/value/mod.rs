//! Value module - In-memory representation of configuration documents.
//!
//! A document is a tree of ordered maps, lists and scalars parsed from JSON
//! or YAML text.

mod value;

pub use value::*;
