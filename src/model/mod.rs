//! Data model shared by adapters, the filter engine and the view builder.

mod duration;
mod filtered;
mod item;
mod status;

pub use duration::*;
pub use filtered::*;
pub use item::*;
pub use status::*;
