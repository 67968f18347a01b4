pub mod config;
pub mod datasource;
pub mod key;
pub mod record;
pub mod series;

// Re-export everything for compatibility
pub use config::*;
pub use datasource::*;
pub use key::*;
pub use record::*;
pub use series::*;
