#![no_main]

use irprobe::ExportStage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(name) = std::str::from_utf8(data) {
        if let Ok(stage) = name.parse::<ExportStage>() {
            assert_eq!(stage.as_str(), name);
        }
    }
});
