use sentry_tee::logging;

struct OtherBackend;

impl log::Log for OtherBackend {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        false
    }

    fn log(&self, _record: &log::Record) {}

    fn flush(&self) {}
}

static OTHER: OtherBackend = OtherBackend;

#[test]
fn init_installs_nothing_when_another_backend_is_registered() {
    log::set_logger(&OTHER).unwrap();

    let result = logging::Builder::new()
        .with_stage(logging::Stage::Nop)
        .build()
        .unwrap()
        .init();

    assert!(result.is_err());
    assert!(logging::default_logger().is_none());
}
