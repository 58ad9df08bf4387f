#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Secrets come from an operator-managed JSON file; parsing must
    // never panic on malformed input.
    let _ = ivmon_config::load_secrets_json(data);
});
