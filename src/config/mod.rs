//! Configuration management module
//!
//! Precedence, highest first: command line flags and `CBANDWIDTH_*`
//! environment variables, the `.env` file, the YAML configuration file,
//! built-in defaults.

pub mod env;
pub mod file;
pub mod parser;

pub use env::EnvManager;
pub use file::ConfigFile;
pub use parser::{display_config_summary, load_config, resolve_hostname, ConfigParser};
