#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 32 * 1024 {
        return;
    }
    let encoding = String::from_utf8_lossy(data);
    // Decoding must classify or reject arbitrary capture text, never panic.
    let _ = reprosyn::decode(&encoding);
    let _ = reprosyn::repair_numeric(&encoding);
});
