pub mod completions;
pub mod dir2mod;
