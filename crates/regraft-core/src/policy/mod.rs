//! Bundled rewrite policies.
//!
//! - [`dir2mod::Dir2Mod`]: replace one subfolder with a submodule link
//!   across every snapshot, maintaining `.gitmodules` along the way.

pub mod dir2mod;

pub use dir2mod::Dir2Mod;
