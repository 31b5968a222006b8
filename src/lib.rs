//! pulse: recent-discussion research from the command line.
//!
//! The heavy lifting lives in [`pulse_search`]; this crate adds the
//! configuration file, externally gathered web results, and the terminal
//! rendering used by the `pulse` binary.

pub mod config;
pub mod error;
pub mod render;
pub mod web;

pub use config::PulseConfig;
pub use error::{PulseError, Result};
pub use render::render_compact;
pub use web::load_web_results;
