use shellpipe::{Options, Service};

#[tokio::test]
async fn local_session_runs_a_real_command() {
    let service = Service::local(Options::default());
    let result = service.run("echo hello-from-shellpipe").await.unwrap();
    assert_eq!(result.output.trim(), "hello-from-shellpipe");
    assert_eq!(result.exit_code, 0);
    assert!(service.pid().await > 0);
    service.close().await.unwrap();
}

#[tokio::test]
async fn local_session_reports_nonzero_exit_codes() {
    let service = Service::local(Options::default());
    let result = service.run("(exit 3)").await.unwrap();
    assert_eq!(result.exit_code, 3);
    service.close().await.unwrap();
}

#[tokio::test]
async fn close_is_idempotent() {
    let service = Service::local(Options::default());
    service.run("true").await.unwrap();
    service.close().await.unwrap();
    service.close().await.unwrap();
}

#[tokio::test]
async fn cwd_option_is_bootstrapped_before_first_command() {
    let options = Options {
        cwd: Some("/tmp".to_string()),
        ..Default::default()
    };
    let service = Service::local(options);
    let result = service.run("pwd").await.unwrap();
    assert_eq!(result.output.trim(), "/tmp");
    service.close().await.unwrap();
}
