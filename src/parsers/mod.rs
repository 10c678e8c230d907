pub mod ata_piix;
pub mod blktrace;
pub mod ranges;
pub mod stream;

pub use ata_piix::{AtaPiixState, TraceReader};
pub use blktrace::{ByteOrder, ByteOrderProbe, TraceCodec};
pub use ranges::{parse_range_file, parse_range_specs};
pub use stream::{StreamMerger, TraceStream};
