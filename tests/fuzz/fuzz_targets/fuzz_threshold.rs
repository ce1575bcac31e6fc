#![no_main]
use libfuzzer_sys::fuzz_target;

use covgate::threshold::{Expression, Metric, Metrics};

fuzz_target!(|data: &[u8]| {
    // Compiling and evaluating must not panic on any input.
    if let Ok(src) = std::str::from_utf8(data) {
        if let Ok(expr) = Expression::compile(src) {
            let _ = expr.evaluate(&Metrics::default());
        }
        let _ = Expression::compile_for(Metric::Time, src);
    }
});
