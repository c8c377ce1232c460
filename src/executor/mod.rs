mod client;
mod models;
mod writer;

pub use client::HttpExecutor;
pub use models::{
    Envelope, ExecutorOptions, HttpMethod, HttpRequest, TransportError, DEFAULT_TIMEOUT,
};
pub use writer::{create_preview, write_exchange};
