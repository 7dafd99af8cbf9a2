//! Command-line front end for browsing a coordination namespace.

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod logging;
pub mod output;
pub mod profiles;
