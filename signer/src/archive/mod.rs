mod base;
mod seven_zip;

pub use base::ArchiveExtractor;
pub use seven_zip::SevenZipExtractor;
