#![no_main]

use irprobe_ir::HloModule;
use irprobe_ir::proto::HloProto;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding arbitrary bytes may fail but must not panic.
    if let Ok(module) = HloModule::from_bytes(data) {
        if module.verify().is_ok() {
            let _ = module.to_string();
        }
    }
    let _ = HloProto::from_bytes(data);
});
