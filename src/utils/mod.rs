pub mod constants;
pub mod histogram;
pub mod logger;

pub use self::histogram::Histogram;
pub use self::logger::Logger;
