use shellpipe::transport::replay::ReplayFixture;
use shellpipe::{Options, Service};

#[tokio::test]
async fn sequential_commands_run_through_one_pipeline() {
    let service = Service::replay(
        vec![
            ReplayFixture::new("echo one", "one", 0),
            ReplayFixture::new("echo two", "two", 0),
        ],
        Options::default(),
    );

    let first = service.run("echo one").await.unwrap();
    assert_eq!(first.output.trim(), "one");

    let second = service.run("echo two").await.unwrap();
    assert_eq!(second.output.trim(), "two");
}

#[tokio::test]
async fn per_call_timeout_overlay_does_not_affect_session_default() {
    let service = Service::replay(
        vec![ReplayFixture::new("echo fast", "fast", 0)],
        Options::default(),
    );

    let patch = Options {
        timeout_ms: Some(500),
        ..Default::default()
    };
    let result = service.run_with("echo fast", &patch).await.unwrap();
    assert_eq!(result.output.trim(), "fast");

    // A second call without the patch should still use the session default.
    let service2 = Service::replay(
        vec![ReplayFixture::new("echo fast", "fast", 0)],
        Options::default(),
    );
    let result2 = service2.run("echo fast").await.unwrap();
    assert_eq!(result2.exit_code, 0);
}
