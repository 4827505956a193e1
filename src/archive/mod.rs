//! Archive codec: directory trees to tar byte streams and back.
//!
//! `create` walks each source depth-first and emits one tar record per
//! node; `extract` replays records onto the filesystem until clean EOF.
//! Entry names are stored relative to their source root (a file source
//! contributes its basename), so extracting into a mount restores it in
//! place. Byte counts cover regular-file contents only, never header or
//! compression framing.

use crate::error::{CachetError, CachetResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default gzip compression level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Supported archive formats.
///
/// Gzip is a decorator: the same tar record codec wrapped in a streaming
/// compressor, not a second archive implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Plain tar records
    Tar,
    /// Gzip-compressed tar records
    Gzip,
}

impl Default for ArchiveFormat {
    fn default() -> Self {
        Self::Tar
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tar => write!(f, "tar"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

/// Streaming archive codec for a set of source trees.
#[derive(Debug, Clone)]
pub struct Archiver {
    format: ArchiveFormat,
    compression_level: u32,
    skip_symlinks: bool,
}

impl Archiver {
    pub fn new(format: ArchiveFormat, compression_level: u32, skip_symlinks: bool) -> Self {
        Self {
            format,
            compression_level: compression_level.min(9),
            skip_symlinks,
        }
    }

    /// Write the contents of `sources` as an archive into `w`.
    ///
    /// Returns the number of regular-file content bytes copied. A source
    /// that cannot be stat'ed fails the call with `SourceUnreachable`
    /// without corrupting the records already written for prior sources.
    pub fn create<W: Write>(&self, sources: &[PathBuf], w: W) -> CachetResult<u64> {
        match self.format {
            ArchiveFormat::Tar => {
                let (written, _w) = pack(sources, w, self.skip_symlinks)?;
                Ok(written)
            }
            ArchiveFormat::Gzip => {
                let encoder = GzEncoder::new(w, Compression::new(self.compression_level));
                let (written, encoder) = pack(sources, encoder, self.skip_symlinks)?;
                encoder
                    .finish()
                    .map_err(|e| CachetError::io("finish compressed archive", e))?;
                Ok(written)
            }
        }
    }

    /// Read archive records from `r` and restore them under `dst`.
    ///
    /// Returns the number of regular-file content bytes restored. A
    /// missing destination root is created. Clean EOF ends the stream;
    /// anything undecodable surfaces as `ArchiveNotReadable` (or
    /// `CompressionHeaderInvalid` for a stream that is not gzip at all).
    pub fn extract<R: Read>(&self, dst: &Path, r: R) -> CachetResult<u64> {
        match self.format {
            ArchiveFormat::Tar => unpack(dst, r),
            ArchiveFormat::Gzip => {
                let mut r = r;
                let mut magic = [0u8; 2];
                r.read_exact(&mut magic)
                    .map_err(|_| CachetError::CompressionHeaderInvalid)?;
                if magic != GZIP_MAGIC {
                    return Err(CachetError::CompressionHeaderInvalid);
                }
                unpack(dst, GzDecoder::new(io::Cursor::new(magic).chain(r)))
            }
        }
    }
}

fn pack<W: Write>(sources: &[PathBuf], w: W, skip_symlinks: bool) -> CachetResult<(u64, W)> {
    let mut builder = tar::Builder::new(w);
    let mut written = 0u64;
    // hard links are tracked by (dev, ino) across all sources so the
    // second occurrence becomes a link record instead of duplicate bytes
    let mut seen: HashMap<(u64, u64), PathBuf> = HashMap::new();

    for source in sources {
        fs::metadata(source).map_err(|e| CachetError::SourceUnreachable {
            path: source.clone(),
            source: e,
        })?;

        written += pack_tree(&mut builder, source, skip_symlinks, &mut seen)?;
    }

    let w = builder
        .into_inner()
        .map_err(|e| CachetError::io("finish archive", e))?;

    Ok((written, w))
}

fn pack_tree<W: Write>(
    builder: &mut tar::Builder<W>,
    source: &Path,
    skip_symlinks: bool,
    seen: &mut HashMap<(u64, u64), PathBuf>,
) -> CachetResult<u64> {
    let mut written = 0u64;

    let walker = WalkDir::new(source)
        .follow_links(false)
        .follow_root_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            CachetError::HeaderBuild {
                path,
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem walk failed")),
            }
        })?;

        let meta = entry.metadata().map_err(|e| CachetError::HeaderBuild {
            path: entry.path().to_path_buf(),
            source: e
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("stat failed")),
        })?;

        let file_type = entry.file_type();

        let Some(name) = entry_name(source, entry.path(), entry.depth(), file_type.is_dir()) else {
            // the source root directory itself; extract recreates it as dst
            continue;
        };

        if file_type.is_symlink() {
            if skip_symlinks {
                debug!(path = %entry.path().display(), "skipping symbolic link");
                continue;
            }

            let target =
                fs::read_link(entry.path()).map_err(|e| CachetError::HeaderBuild {
                    path: entry.path().to_path_buf(),
                    source: e,
                })?;

            let mut header = tar::Header::new_gnu();
            header.set_metadata(&meta);
            header.set_entry_type(tar::EntryType::Symlink);
            header.set_size(0);
            builder
                .append_link(&mut header, &name, &target)
                .map_err(|e| CachetError::HeaderBuild {
                    path: entry.path().to_path_buf(),
                    source: e,
                })?;
        } else if file_type.is_dir() {
            let mut header = tar::Header::new_gnu();
            header.set_metadata(&meta);
            header.set_size(0);
            builder
                .append_data(&mut header, &name, io::empty())
                .map_err(|e| CachetError::HeaderBuild {
                    path: entry.path().to_path_buf(),
                    source: e,
                })?;
        } else if file_type.is_file() {
            if meta.nlink() > 1 {
                let key = (meta.dev(), meta.ino());
                if let Some(first) = seen.get(&key) {
                    let mut header = tar::Header::new_gnu();
                    header.set_metadata(&meta);
                    header.set_entry_type(tar::EntryType::Link);
                    header.set_size(0);
                    builder
                        .append_link(&mut header, &name, first)
                        .map_err(|e| CachetError::HeaderBuild {
                            path: entry.path().to_path_buf(),
                            source: e,
                        })?;
                    continue;
                }
                seen.insert(key, name.clone());
            }

            let mut file = File::open(entry.path()).map_err(|e| CachetError::ContentCopy {
                path: entry.path().to_path_buf(),
                source: e,
            })?;

            let mut header = tar::Header::new_gnu();
            header.set_metadata(&meta);
            header.set_size(meta.len());
            builder
                .append_data(&mut header, &name, &mut file)
                .map_err(|e| CachetError::ContentCopy {
                    path: entry.path().to_path_buf(),
                    source: e,
                })?;

            written += meta.len();
        } else {
            // sockets, devices and the like have no place in a build cache
            debug!(path = %entry.path().display(), "skipping special file");
        }
    }

    Ok(written)
}

/// Archive name for a node: relative to the source root, basename for a
/// file source. `None` marks the root directory itself.
fn entry_name(source: &Path, path: &Path, depth: usize, is_dir: bool) -> Option<PathBuf> {
    if depth == 0 {
        if is_dir {
            return None;
        }
        return path.file_name().map(PathBuf::from);
    }

    path.strip_prefix(source).ok().map(PathBuf::from)
}

fn unpack<R: Read>(dst: &Path, r: R) -> CachetResult<u64> {
    fs::create_dir_all(dst)
        .map_err(|e| CachetError::io(format!("create destination {}", dst.display()), e))?;

    let mut archive = tar::Archive::new(r);
    let mut written = 0u64;

    let entries = archive
        .entries()
        .map_err(|e| CachetError::ArchiveNotReadable { source: e })?;

    for entry in entries {
        let mut entry = entry.map_err(|e| CachetError::ArchiveNotReadable { source: e })?;

        let name = entry
            .path()
            .map_err(|e| CachetError::ArchiveNotReadable { source: e })?
            .into_owned();
        let kind = entry.header().entry_type();
        let mode = entry
            .header()
            .mode()
            .map_err(|e| CachetError::ArchiveNotReadable { source: e })?;

        let Some(target) = join_entry(dst, &name) else {
            warn!(entry = %name.display(), "skipping archive entry escaping the destination");
            continue;
        };

        match kind {
            tar::EntryType::Directory => {
                DirBuilder::new()
                    .recursive(true)
                    .mode(mode)
                    .create(&target)
                    .map_err(|e| {
                        CachetError::io(format!("create directory {}", target.display()), e)
                    })?;
            }
            tar::EntryType::Regular
            | tar::EntryType::Continuous
            | tar::EntryType::Char
            | tar::EntryType::Block
            | tar::EntryType::Fifo => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| {
                        CachetError::io(format!("create directory {}", parent.display()), e)
                    })?;
                }

                let mut file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .mode(mode)
                    .open(&target)
                    .map_err(|e| {
                        CachetError::io(format!("open extracted file {}", target.display()), e)
                    })?;

                let n = io::copy(&mut entry, &mut file).map_err(|e| {
                    CachetError::io(format!("write extracted file {}", target.display()), e)
                })?;
                written += n;
            }
            tar::EntryType::Symlink => {
                let link = link_target(&mut entry)?;
                unlink(&target)?;
                std::os::unix::fs::symlink(&link, &target).map_err(|e| {
                    CachetError::io(format!("create symbolic link {}", target.display()), e)
                })?;
            }
            tar::EntryType::Link => {
                let link = link_target(&mut entry)?;
                // hard link targets are archive-relative
                let original = dst.join(&link);
                unlink(&target)?;
                fs::hard_link(&original, &target).map_err(|e| {
                    CachetError::io(format!("create hard link {}", target.display()), e)
                })?;
            }
            other => {
                // global metadata and unknown record kinds are ignored
                debug!(entry = %name.display(), kind = ?other, "skipping archive entry");
            }
        }
    }

    Ok(written)
}

fn link_target<R: Read>(entry: &mut tar::Entry<'_, R>) -> CachetResult<PathBuf> {
    entry
        .link_name()
        .map_err(|e| CachetError::ArchiveNotReadable { source: e })?
        .map(|link| link.into_owned())
        .ok_or_else(|| CachetError::ArchiveNotReadable {
            source: io::Error::new(io::ErrorKind::InvalidData, "link record without a target"),
        })
}

/// Join an entry name under the destination, refusing absolute names and
/// parent-directory components.
fn join_entry(dst: &Path, name: &Path) -> Option<PathBuf> {
    let mut target = dst.to_path_buf();
    for component in name.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(target)
}

fn unlink(path: &Path) -> CachetResult<()> {
    if fs::symlink_metadata(path).is_ok() {
        fs::remove_file(path)
            .map_err(|e| CachetError::io(format!("unlink {}", path.display()), e))?;
    }
    Ok(())
}
