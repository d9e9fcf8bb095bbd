//! `UltraLane`: label synthesis and losses for row-anchor lane detection.
//!
//! This crate re-exports the workspace crates under short names and ships the `ultralane`
//! command-line tool.

#[doc(inline)]
pub use ultralane_data as data;
#[doc(inline)]
pub use ultralane_label as label;
#[doc(inline)]
pub use ultralane_loss as loss;
