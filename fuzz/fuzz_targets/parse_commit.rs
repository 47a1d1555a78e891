#![no_main]

use libfuzzer_sys::fuzz_target;
use regraft_core::commit::Commit;

// Arbitrary bytes must never panic the commit decoder, and anything it
// accepts must survive a serialize/parse round trip.
fuzz_target!(|data: &[u8]| {
    if let Ok(commit) = Commit::parse(data) {
        let bytes = commit.to_bytes();
        let reparsed = Commit::parse(&bytes).expect("serialized commit must re-parse");
        assert_eq!(reparsed, commit);
    }
});
