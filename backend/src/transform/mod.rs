//! Transformation module.
//!
//! Turns one raw sheet grid into validated product records:
//! - Header: header row detection and alias mapping
//! - Grouper: continuation rows collapsed into products
//! - Enrich: extraction service answers merged into products
//! - Normalize / Filter: value cleaning and non-product removal
//! - Pipeline: the per-sheet and per-file entry points

pub mod enrich;
pub mod filter;
pub mod grouper;
pub mod header;
pub mod normalize;
pub mod pipeline;

pub use grouper::{aggregate, DataTable, ProductRow};
pub use header::{find_header_row, make_unique, HeaderMapper, HeaderRow};
pub use pipeline::*;
