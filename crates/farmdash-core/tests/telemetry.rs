use farmdash_core::telemetry::init_tracing;

#[test]
fn subscriber_installs_once() {
    init_tracing().expect("first install succeeds");
    tracing::info!(component = "telemetry-test", "subscriber ready");
    assert!(init_tracing().is_err());
}
