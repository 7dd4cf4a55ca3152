//! Summary table analysis
//!
//! Reads the summary table produced by a batch run back in, interprets trace
//! labels as experiment configurations and derives energy, power and time per
//! section for side-by-side comparison. Chart rendering is left to external
//! tools; this module prepares their data.

mod compare;
mod label;
mod table;

pub use compare::*;
pub use label::*;
pub use table::*;
