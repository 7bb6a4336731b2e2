#![no_main]

use fbind_core::{MemberPath, MemberPathCache};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let cache = MemberPathCache::new();
    match MemberPath::parse(raw) {
        Ok(path) => {
            // Parsing the canonical form yields the same members.
            let again = MemberPath::parse(path.path()).expect("canonical path reparses");
            assert_eq!(again.members(), path.members());
            assert_eq!(path.is_empty(), path.len() == 0);
            let cached = cache.get_or_parse(raw).expect("cache agrees with parse");
            assert_eq!(cached.members(), path.members());
        }
        Err(error) => {
            assert_eq!(cache.get_or_parse(raw).unwrap_err(), error);
        }
    }
});
