//! Command implementations.

mod info;
mod run;
mod source;
mod validate;

pub use info::run_info;
pub use run::run_streamer;
pub use validate::run_validate;
