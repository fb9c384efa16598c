//! Error tracking side of the tee: turns log records into reports for a Sentry compatible
//! service.

mod config;
mod fields;
mod report;
mod severity;
mod sink;
mod stacktrace;
mod transport;

pub use self::config::{Configuration, Trace, TEST_DSN};
pub use self::fields::Fields;
pub use self::report::{Record, Report, PLATFORM};
pub use self::severity::Severity;
pub use self::sink::SentryCore;
pub use self::stacktrace::{Frame, Stacktrace};
pub use self::transport::{Delivery, Tags, Transport};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::{Delivery, Report, Tags, Transport};

    /// Transport double that records every call.
    #[derive(Default)]
    pub struct RecordingTransport {
        captured: Mutex<Vec<(Report, Tags)>>,
        events: Mutex<Vec<&'static str>>,
        fail_wait: bool,
    }

    impl RecordingTransport {
        pub fn failing_wait() -> Self {
            Self {
                fail_wait: true,
                ..Default::default()
            }
        }

        pub fn captured(&self) -> Vec<(Report, Tags)> {
            self.captured.lock().unwrap().clone()
        }

        pub fn events(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().clone()
        }

        pub fn waits(&self) -> usize {
            self.events().iter().filter(|e| **e == "wait").count()
        }
    }

    impl Transport for RecordingTransport {
        fn capture(&self, report: Report, tags: &Tags) -> Delivery {
            let event_id = report.event_id.clone();
            self.events.lock().unwrap().push("capture");
            self.captured.lock().unwrap().push((report, tags.clone()));
            Delivery::ready(Ok(event_id))
        }

        fn wait(&self) -> eyre::Result<()> {
            self.events.lock().unwrap().push("wait");
            if self.fail_wait {
                eyre::bail!("delivery could not be confirmed");
            }
            Ok(())
        }
    }
}
