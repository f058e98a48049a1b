#![no_main]

use libfuzzer_sys::fuzz_target;
use sbxml::math::{evaluate, expand_function_definitions, parse_math, Environment, InlineConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(mut expr) = parse_math(text) {
        let _ = evaluate(&expr, &mut Environment::new(), None);
        let _ = expand_function_definitions(&mut expr, &[], &InlineConfig::new());
    }
});
