//! Log sink adapter that tees structured log records into a Sentry compatible error tracking
//! service.
//!
//! Records at [`Level::ERROR`] and above are turned into reports and handed to a
//! [`sentry::Transport`]. Everything else stays on the local side of the tee, see [`logging`].

pub mod http;
pub mod level;
pub mod logging;
pub mod sentry;

pub use level::Level;
pub use logging::{Builder, Logger, Stage};
pub use sentry::{Configuration, Record, SentryCore, Severity, Tags, Transport};
