#![no_main]

use libfuzzer_sys::arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use pg_session::SessionConfig;

#[derive(Debug)]
struct ResolveInput {
    explicit: SessionConfig,
    env: Vec<(String, String)>,
}

impl<'a> Arbitrary<'a> for ResolveInput {
    fn arbitrary(u: &mut Unstructured<'a>) -> libfuzzer_sys::arbitrary::Result<Self> {
        let explicit = SessionConfig {
            host: u.arbitrary()?,
            dbname: u.arbitrary()?,
            user: u.arbitrary()?,
            password: u.arbitrary()?,
            port: u.arbitrary()?,
            cursor_name: u.arbitrary()?,
            fetch_size: u.arbitrary()?,
            retry_policy: None,
        };
        let env = u.arbitrary()?;
        Ok(Self { explicit, env })
    }
}

fuzz_target!(|input: ResolveInput| {
    let lookup = |key: &str| {
        input
            .env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    };

    if let Ok(settings) = input.explicit.resolve_with(lookup) {
        // Explicit values always win over the environment
        if let Some(host) = &input.explicit.host {
            assert_eq!(settings.credentials.host(), host);
        }
        if let Some(port) = input.explicit.port {
            assert_eq!(settings.credentials.port(), port);
        }
        assert!(settings.fetch_size > 0);
    }
});
