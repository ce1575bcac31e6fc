#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Sniffing tries every decoder; none may panic.
    if let Ok((_, coverage)) = covgate::detect::sniff(data) {
        assert!(coverage.covered <= coverage.total);
    }
});
