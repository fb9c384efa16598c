mod dsn;
mod transport;

pub use dsn::Dsn;
pub use transport::{Builder, HttpTransport, DEFAULT_TIMEOUT};
