//! CBZ packaging with embedded `ComicInfo.xml`.
//!
//! # Layout
//!
//! ```text
//! {library_root}/{series}/c{number} {title}.cbz
//!     ComicInfo.xml      (when title metadata is available)
//!     001.jpg
//!     002.jpg
//!     ...
//! ```

mod comic_info;
mod error;
pub mod filename;
mod packager;
mod transcode;

pub use comic_info::{COMIC_INFO_ENTRY, ComicInfo};
pub use error::ArchiveError;
pub use filename::{chapter_file_name, series_dir_name};
pub use packager::ArchivePackager;
pub use transcode::{JPEG_QUALITY, normalize_to_jpeg};
