#![no_main]

use libfuzzer_sys::fuzz_target;
use regraft_core::store::git::{format_mktree_line, parse_ls_tree_line};

// Arbitrary lines must never panic the tree-entry parser, and anything
// it accepts must survive a format/parse round trip.
fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(entry) = parse_ls_tree_line(line) {
        let reformatted = format_mktree_line(&entry);
        assert_eq!(parse_ls_tree_line(&reformatted).ok(), Some(entry));
    }
});
