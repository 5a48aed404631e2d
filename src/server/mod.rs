pub mod context;
pub mod error;
pub mod handler;
pub mod listener;
pub mod registry;

pub type Result<T> = std::result::Result<T, Error>;

pub use context::ServerContext;
pub use error::Error;
pub use registry::ListenerRegistry;
