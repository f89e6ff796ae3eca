#![no_main]

use libfuzzer_sys::fuzz_target;
use testbed_syntax::{Format, read_fixture, transcript, write_fixture};

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        for format in Format::ALL {
            // Whatever parses must write back out and parse to the same records
            if let Ok(records) = read_fixture(s, format) {
                if let Ok(text) = write_fixture(&records, format) {
                    assert_eq!(read_fixture(&text, format).ok(), Some(records));
                }
            }
        }
        let _ = transcript::parse("fuzz", s);
    }
});
