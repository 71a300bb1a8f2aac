#![no_main]

use libfuzzer_sys::fuzz_target;
use pg_session::SessionConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    // Must never panic, whatever the input
    let _ = SessionConfig::from_url(s);

    let url = format!("postgres://{}", s);
    if let Ok(config) = SessionConfig::from_url(&url) {
        let _ = config.resolve_with(|_| None);
    }
});
