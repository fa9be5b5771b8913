pub mod everyayah;
pub mod pexels;
pub mod quran_text;
pub mod vision;

pub(crate) const USER_AGENT: &str = concat!("quran-shorts/", env!("CARGO_PKG_VERSION"));
