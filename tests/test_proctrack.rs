use shellpipe::proctrack::ProcTracker;
use std::time::Duration;

#[tokio::test]
async fn tracker_resolves_once_a_short_lived_process_exits() {
    let tracker = ProcTracker::spawn();

    let mut cmd = tokio::process::Command::new("sh");
    cmd.arg("-c").arg("sleep 0.1");
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            nix::unistd::setsid().map_err(std::io::Error::other)?;
            Ok(())
        });
    }
    let child = cmd.spawn().expect("spawn sh -c sleep");
    let pid = child.id().expect("child has a pid") as i32;

    let done = tracker.register_group(pid);
    let result = tokio::time::timeout(Duration::from_secs(5), done).await;
    assert!(result.is_ok(), "process group did not report exit in time");
}
