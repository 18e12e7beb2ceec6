use crate::error::Error as SixErr;
pub type Result<T> = std::result::Result<T, SixErr>;
