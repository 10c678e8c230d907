mod event;
mod reader_variant;
mod window;

pub use event::*;
pub use reader_variant::ReaderVariant;
pub use window::{DeviceRanges, TimeWindow};
