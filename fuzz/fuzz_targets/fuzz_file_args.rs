#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Arguments such as `json: -` or `schema+yaml: a.txt`
        let args: Vec<String> = content.split('\n').map(str::to_string).collect();
        let _ = cueplan::encoding::filetypes::parse_args(&args);
    }
});
