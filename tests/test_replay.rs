use shellpipe::transport::replay::ReplayFixture;
use shellpipe::{Options, Service};

#[tokio::test]
async fn matched_command_returns_fixture_output_and_code() {
    let service = Service::replay(
        vec![ReplayFixture::new("echo hello", "hello", 0)],
        Options::default(),
    );
    let result = service.run("echo hello").await.unwrap();
    assert_eq!(result.output.trim(), "hello");
    assert_eq!(result.exit_code, 0);
}

#[tokio::test]
async fn fixture_with_nonzero_exit_code_is_reported() {
    let service = Service::replay(
        vec![ReplayFixture::new("false", "", 1)],
        Options::default(),
    );
    let result = service.run("false").await.unwrap();
    assert_eq!(result.exit_code, 1);
}

#[tokio::test]
async fn fixture_with_stderr_carries_it_alongside_output() {
    let service = Service::replay(
        vec![ReplayFixture::new("bad-cmd", "", 127).with_error("command not found")],
        Options::default(),
    );
    let result = service.run("bad-cmd").await.unwrap();
    assert_eq!(result.exit_code, 127);
    assert_eq!(result.stderr.as_deref(), Some("command not found"));
}

#[tokio::test]
async fn unmatched_command_surfaces_replay_miss() {
    let service = Service::replay(Vec::new(), Options::default());
    let err = service.run("unregistered-command").await.unwrap_err();
    assert!(matches!(err, shellpipe::ShellError::ReplayMiss));
}
