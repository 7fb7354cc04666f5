//! Record model shared by every pipeline stage.
//!
//! Records are produced by the extraction collaborator (one per cell or
//! token), enriched by the classifier and masker, and finally serialized or
//! written back onto the source workbook.

mod key;
mod record;
mod types;

pub use key::*;
pub use record::*;
pub use types::*;
