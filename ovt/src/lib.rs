pub mod error;
pub mod layout;
pub mod outline;
pub mod parse;

#[cfg(test)]
mod testutil;

pub use error::{OvtError, OvtErrorKind, OvtErrorSource};
pub use layout::{FontFeatures, LayoutContext};
pub use outline::{GlyphOutline, PathOp, Point};
pub use parse::Font;
