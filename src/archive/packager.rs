//! CBZ assembly with an all-or-nothing final path.
//!
//! Archives are built under the work directory as `{chapter_id}.cbz.tmp` and
//! moved into the library only once every entry has been written. When the
//! work directory and the library live on different filesystems the archive
//! is copied next to its destination as `{name}.part` first, then renamed, so
//! the final path never holds a partially written file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use super::comic_info::{COMIC_INFO_ENTRY, ComicInfo};
use super::error::ArchiveError;
use super::filename::temp_stem;
use super::transcode::normalize_to_jpeg;

/// Builds chapter archives.
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    work_dir: PathBuf,
}

impl ArchivePackager {
    /// Creates a packager that stages archives under `work_dir`.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Staging directory.
    #[must_use]
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Staging path for a chapter's archive.
    #[must_use]
    pub fn temp_path(&self, chapter_id: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}.cbz.tmp", temp_stem(chapter_id)))
    }

    /// Writes `ComicInfo.xml` (when given) and the images as `001.jpg`,
    /// `002.jpg`, ... into an archive at `destination`.
    ///
    /// Blocking; call from `spawn_blocking` in async code.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if any entry cannot be written or the archive
    /// cannot be moved into place. The destination is left absent and the
    /// staging file is removed.
    #[instrument(skip(self, comic_info, images), fields(images = images.len(), destination = %destination.display()))]
    pub fn package(
        &self,
        chapter_id: &str,
        comic_info: Option<&ComicInfo>,
        images: Vec<Vec<u8>>,
        destination: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        fs::create_dir_all(&self.work_dir).map_err(|e| ArchiveError::io(&self.work_dir, e))?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }

        let tmp_path = self.temp_path(chapter_id);
        let file = File::create(&tmp_path).map_err(|e| ArchiveError::io(&tmp_path, e))?;
        self.finish_package(BufWriter::new(file), &tmp_path, comic_info, images, destination)
    }

    /// Writes the archive into `sink` (which backs `tmp_path`) and moves
    /// `tmp_path` to `destination` on success. On any failure `tmp_path` is
    /// removed and `destination` is not created.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] on write or move failure.
    pub fn finish_package<W: Write + Seek>(
        &self,
        sink: W,
        tmp_path: &Path,
        comic_info: Option<&ComicInfo>,
        images: Vec<Vec<u8>>,
        destination: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        let outcome = write_archive(sink, tmp_path, comic_info, images)
            .and_then(|entries| {
                move_into_place(tmp_path, destination)?;
                Ok(entries)
            });

        match outcome {
            Ok(entries) => {
                info!(entries, path = %destination.display(), "archive packaged");
                Ok(destination.to_path_buf())
            }
            Err(error) => {
                warn!(error = %error, tmp = %tmp_path.display(), "archive packaging failed, discarding");
                remove_if_present(tmp_path);
                Err(error)
            }
        }
    }
}

/// Writes all entries and finalizes the zip. Returns the entry count.
fn write_archive<W: Write + Seek>(
    sink: W,
    tmp_path: &Path,
    comic_info: Option<&ComicInfo>,
    images: Vec<Vec<u8>>,
) -> Result<usize, ArchiveError> {
    let mut zip = zip::ZipWriter::new(sink);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = 0;

    if let Some(info) = comic_info {
        zip.start_file(COMIC_INFO_ENTRY, options)
            .map_err(ArchiveError::zip)?;
        zip.write_all(info.to_xml().as_bytes())
            .map_err(|e| ArchiveError::io(tmp_path, e))?;
        entries += 1;
    }

    for (index, image) in images.into_iter().enumerate() {
        let name = format!("{:03}.jpg", index + 1);
        let payload = normalize_to_jpeg(image);
        zip.start_file(name.as_str(), options)
            .map_err(ArchiveError::zip)?;
        zip.write_all(&payload)
            .map_err(|e| ArchiveError::io(tmp_path, e))?;
        entries += 1;
    }

    let mut sink = zip.finish().map_err(ArchiveError::zip)?;
    sink.flush().map_err(|e| ArchiveError::io(tmp_path, e))?;
    debug!(entries, "archive entries written");
    Ok(entries)
}

/// Renames `from` onto `to`, copying through `{to}.part` when the rename
/// crosses filesystems.
fn move_into_place(from: &Path, to: &Path) -> Result<(), ArchiveError> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
            debug!("rename crosses filesystems, copying through staging file");
            let part = part_path(to);
            let copied = fs::copy(from, &part)
                .and_then(|_| fs::rename(&part, to))
                .map_err(|e| ArchiveError::io(to, e));
            if copied.is_err() {
                remove_if_present(&part);
            } else {
                remove_if_present(from);
            }
            copied
        }
        Err(error) => Err(ArchiveError::io(to, error)),
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

fn remove_if_present(path: &Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %error, "failed to remove staging file");
    }
}
