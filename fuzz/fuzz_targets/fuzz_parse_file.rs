#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Whatever parses must also format without panicking
        if let Ok(file) = cueplan::parse_file("fuzz.cue", content) {
            let _ = cueplan::format_file(&file, 4);
        }
    }
});
