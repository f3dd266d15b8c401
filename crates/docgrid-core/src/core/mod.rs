//! Shared infrastructure for the docgrid crates

pub mod logging;
