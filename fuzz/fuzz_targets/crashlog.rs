#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }
    let log = String::from_utf8_lossy(data);
    for slice in reprosyn::split_occurrences(&log) {
        let occurrence = reprosyn::parse_occurrence(slice);
        for encoding in &occurrence.encodings {
            let _ = reprosyn::decode(encoding);
        }
    }
});
