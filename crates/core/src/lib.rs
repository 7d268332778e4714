pub mod config;
pub mod error;
pub mod naming;
pub mod retry;

pub use config::Config;
pub use error::*;
pub use naming::{normalize_table_name, table_name_from_value};
pub use retry::RetryPolicy;
