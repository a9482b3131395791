//! Source tree enumeration

mod walker;

pub use walker::{list_files, try_list_files};
