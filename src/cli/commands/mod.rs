//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod index;
mod manuals;
mod run;
mod serve;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use index::run_index;
pub use manuals::run_manuals;
pub use run::run_run;
pub use serve::run_serve;
