use shellpipe::window::Window;
use shellpipe::Options;
use std::sync::{Arc, Mutex};

fn recording_options(flash_interval_ms: u64) -> (shellpipe::options::EffectiveOptions, Arc<Mutex<Vec<(String, bool)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let calls_clone = calls.clone();
    let opts = Options {
        flash_interval_ms: Some(flash_interval_ms),
        listener: Some(Arc::new(move |chunk: &str, has_more: bool| {
            calls_clone.lock().unwrap().push((chunk.to_string(), has_more));
        })),
        ..Default::default()
    }
    .resolve();
    (opts, calls)
}

#[test]
fn every_read_terminates_with_a_has_more_false_sentinel() {
    let (opts, calls) = recording_options(0);
    {
        let mut window = Window::new(&opts);
        window.notify("building...");
        window.notify("done");
    }
    let calls = calls.lock().unwrap();
    assert_eq!(calls.last().unwrap(), &("".to_string(), false));
}

#[test]
fn buffered_mode_coalesces_until_flush() {
    let (opts, calls) = recording_options(10_000);
    let mut window = Window::new(&opts);
    window.notify("a");
    window.notify("b");
    assert!(calls.lock().unwrap().is_empty());
    window.flush();
    let calls = calls.lock().unwrap();
    assert_eq!(calls[0], ("ab".to_string(), true));
    assert_eq!(calls[1], ("".to_string(), false));
}
