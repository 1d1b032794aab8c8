pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod server;
pub mod validate;

pub use config::{BridgeConfig, ConverterConfig};
pub use convert::{Codec, Converter};
pub use error::{BridgeError, Result};
pub use format::MessageFormat;
pub use server::{build_router, AppState};
