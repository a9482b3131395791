//! Change detection - copy/skip verdicts per file pair

mod compare;

pub use compare::{decide, decide_until_stopped};
