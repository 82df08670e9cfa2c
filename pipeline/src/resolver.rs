//! Format detection and archive extraction for uploaded source files.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    ShapefileArchive,
    Shapefile,
    GeoJson,
    GeoPackage,
    GeoTiff,
    Unknown,
}

impl SourceFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "zip" => SourceFormat::ShapefileArchive,
            "shp" => SourceFormat::Shapefile,
            "geojson" | "json" => SourceFormat::GeoJson,
            "gpkg" => SourceFormat::GeoPackage,
            "tif" | "tiff" => SourceFormat::GeoTiff,
            _ => SourceFormat::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::ShapefileArchive => "shapefile_zip",
            SourceFormat::Shapefile => "shapefile",
            SourceFormat::GeoJson => "geojson",
            SourceFormat::GeoPackage => "geopackage",
            SourceFormat::GeoTiff => "geotiff",
            SourceFormat::Unknown => "unknown",
        }
    }

    /// Whether ogr2ogr can load this format as vector data.
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            SourceFormat::ShapefileArchive
                | SourceFormat::Shapefile
                | SourceFormat::GeoJson
                | SourceFormat::GeoPackage
        )
    }
}

/// A source file ready for loading.
///
/// For archives this owns the extraction directory, which is removed when the
/// value is dropped.
#[derive(Debug)]
pub struct ResolvedSource {
    pub format: SourceFormat,
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl ResolvedSource {
    /// The file to hand to the loader.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The extraction directory, if the source was an archive.
    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|d| d.path())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Resolver {
    /// Parent for extraction directories; the system temp dir when `None`.
    scratch_root: Option<PathBuf>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scratch_root(root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: Some(root.into()),
        }
    }

    /// Determine the format of `path` and, for archives, extract it and locate the `.shp`.
    pub async fn resolve(&self, path: &Path) -> Result<ResolvedSource> {
        let format = SourceFormat::from_path(path);

        if !format.is_vector() {
            return Err(PipelineError::FormatUnsupported {
                extension: path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default(),
            });
        }

        if format != SourceFormat::ShapefileArchive {
            return Ok(ResolvedSource {
                format,
                path: path.to_path_buf(),
                scratch: None,
            });
        }

        let scratch = self.scratch_dir()?;
        let archive = path.to_path_buf();
        let target = scratch.path().to_path_buf();

        // `scratch` is dropped (and removed) on every early return below.
        let shp = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
            extract_archive(&archive, &target)?;
            find_shapefile(&target)?.ok_or(PipelineError::NoShapefileFound)
        })
        .await
        .map_err(|e| PipelineError::Io(std::io::Error::other(e)))??;

        tracing::info!(path = %shp.display(), "extracted shapefile");

        Ok(ResolvedSource {
            format,
            path: shp,
            scratch: Some(scratch),
        })
    }

    fn scratch_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("layer-import-");
        Ok(match &self.scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        })
    }
}

/// Unzip `archive` into `target`. Entries whose names would escape `target` are skipped.
fn extract_archive(archive: &Path, target: &Path) -> Result<()> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let out_path = match entry.enclosed_name() {
            Some(name) => target.join(name),
            None => {
                tracing::warn!(entry = %entry.name(), "skipping archive entry outside extraction root");
                continue;
            }
        };

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(())
}

/// Depth-first search for the first `*.shp`, visiting entries in name order.
/// macOS resource-fork entries (`__MACOSX/`, `._*`) are ignored.
fn find_shapefile(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.retain(|p| {
        p.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| !n.starts_with("._") && n != "__MACOSX")
    });
    entries.sort();

    // Files in a directory are checked before descending into subdirectories.
    for path in entries.iter().filter(|p| p.is_file()) {
        if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("shp"))
        {
            return Ok(Some(path.clone()));
        }
    }
    for path in entries.iter().filter(|p| p.is_dir()) {
        if let Some(found) = find_shapefile(path)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}
