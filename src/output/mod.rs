//! Output formatting module
//!
//! Renders result trees for terminals, files, and other tools.

mod formatter;

pub use formatter::{write_tree_to_file, OutputFormat, ResultFormatter};
