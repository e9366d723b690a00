use shellpipe::clean::clean;

#[test]
fn strips_ansi_color_codes_from_prompt_output() {
    let raw = "\x1b[32mok\x1b[0m\n";
    assert_eq!(clean(raw), "ok\n");
}

#[test]
fn strips_cursor_and_erase_sequences() {
    let raw = "\x1b[2K\x1b[1Ghello";
    assert_eq!(clean(raw), "hello");
}

#[test]
fn leaves_text_without_escapes_untouched() {
    let raw = "plain output\nwith multiple lines\n";
    assert_eq!(clean(raw), raw);
}

#[test]
fn cleaning_twice_is_the_same_as_once() {
    let raw = "\x1b[1;31mwarning\x1b[0m: disk low";
    let once = clean(raw);
    let twice = clean(&once);
    assert_eq!(once, twice);
}
