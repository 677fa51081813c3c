mod format;
pub use format::LoggerFormat;

mod level;
pub use level::LoggerLevel;

mod timer;
pub use timer::LoggerTimer;

pub(crate) mod timezone;
pub use timezone::{LoggerTimeZone, init_local_offset};
