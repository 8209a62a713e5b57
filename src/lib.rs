//! Codecs for the `ARC`/`GMD` script containers of a localized visual-novel release.
//!
//! For more information on the on-disk layouts, see `SPEC_FULL.md` in the
//! repository root — this crate is the living specification for both formats.
pub mod arc;
pub mod args;
pub mod deflate;
pub mod error;
pub mod gmd;
pub mod hash;
pub mod ident;
pub mod roundtrip;
pub mod sidecar;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use types::{ArcArchive, ArcEntry, GmdEntry, GmdRegistry};
