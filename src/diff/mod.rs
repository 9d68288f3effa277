//! Diff module - Computing the patch between an edited document and the
//! document the cluster reported.
//!
//! [`diff`] finds what changed; [`scrub`] guarantees nothing protected is
//! left in the result. Both are total functions: any pair of trees yields a
//! result.

mod scrub;
mod structural;


pub use scrub::*;
pub use structural::*;
