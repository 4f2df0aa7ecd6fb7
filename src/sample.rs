use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::{NamedTempFile, TempDir};
use tracing::debug;

use crate::compose::{Composite, DroppedGlyph, Substitution};
use crate::config::{GeneratorKind, OutputFormat};
use crate::error::StorageError;
use crate::glyph::CharBox;

const JPEG_QUALITY: u8 = 95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    pub index: u64,
    pub seed: u64,
    pub language: String,
    pub generator: GeneratorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    pub attempts: u32,
    pub stages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub substitutions: Vec<Substitution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedGlyph>,
}

/// A finished, accepted sample on its way to a writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: GrayImage,
    pub label_text: String,
    pub boxes: Option<Vec<CharBox>>,
    pub metadata: SampleMetadata,
}

/// One line of the label files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub filename: String,
    pub path: String,
    pub text: String,
    pub size: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boxes: Option<Vec<CharBox>>,
    pub metadata: SampleMetadata,
}

impl LabelRecord {
    fn describe(sample: &Sample, filename: String, path: String) -> Self {
        Self {
            filename,
            path,
            text: sample.label_text.clone(),
            size: [sample.image.width(), sample.image.height()],
            boxes: sample.boxes.clone(),
            metadata: sample.metadata.clone(),
        }
    }
}

pub type WriteResult = Result<LabelRecord, StorageError>;

/// Persists samples. A writer belongs to one shard attempt; nothing it
/// accepted becomes visible until `finish` commits it.
pub trait DatasetWriter: Send {
    fn write(&mut self, sample: Sample) -> WriteResult;

    /// Commits every sample written so far, together with its label data.
    fn finish(&mut self) -> Result<(), StorageError>;

    /// Throws away everything written since the writer was created.
    fn discard(&mut self);
}

/// Bundles a composite into a sample and hands it to `writer`.
pub fn emit(
    composite: Composite,
    mut metadata: SampleMetadata,
    include_boxes: bool,
    writer: &mut dyn DatasetWriter,
) -> WriteResult {
    let Composite {
        image,
        boxes,
        text,
        substitutions,
        dropped,
    } = composite;
    metadata.substitutions = substitutions;
    metadata.dropped = dropped;
    writer.write(Sample {
        image,
        label_text: text,
        boxes: include_boxes.then_some(boxes),
        metadata,
    })
}

/// Writes `shard_NNN/<prefix>_<index>.<ext>` images plus a `labels.json` per shard.
///
/// Images are staged in a hidden sibling directory and the whole shard is
/// renamed into place by `finish`.
#[derive(Debug)]
pub struct DirectoryWriter {
    root: PathBuf,
    dir_name: String,
    format: OutputFormat,
    name_prefix: String,
    staging: Option<TempDir>,
    records: Vec<LabelRecord>,
}

impl DirectoryWriter {
    pub fn new(root: &Path, shard: usize, format: OutputFormat, name_prefix: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            dir_name: shard_dir_name(shard),
            format,
            name_prefix: name_prefix.to_string(),
            staging: None,
            records: Vec::new(),
        }
    }

    /// Final location of the shard once committed.
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.dir_name)
    }

    fn staging_dir(&mut self) -> Result<PathBuf, StorageError> {
        if let Some(staging) = &self.staging {
            return Ok(staging.path().to_path_buf());
        }
        let io_err = |source| StorageError::Io {
            path: self.root.clone(),
            source,
        };
        fs::create_dir_all(&self.root).map_err(io_err)?;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}-", self.dir_name))
            .tempdir_in(&self.root)
            .map_err(io_err)?;
        let path = staging.path().to_path_buf();
        self.staging = Some(staging);
        Ok(path)
    }
}

impl DatasetWriter for DirectoryWriter {
    fn write(&mut self, sample: Sample) -> WriteResult {
        let staging = self.staging_dir()?;
        let filename = format!(
            "{}_{:06}.{}",
            self.name_prefix,
            sample.metadata.index,
            self.format.extension()
        );
        let path = staging.join(&filename);
        write_image_atomic(&staging, &path, &sample.image, self.format)?;
        let relative = format!("{}/{}", self.dir_name, filename);
        let record = LabelRecord::describe(&sample, filename, relative);
        debug!("staged {}", path.display());
        self.records.push(record.clone());
        Ok(record)
    }

    fn finish(&mut self) -> Result<(), StorageError> {
        let Some(staging) = self.staging.take() else {
            return Ok(());
        };
        if self.records.is_empty() {
            return Ok(());
        }
        write_labels(&staging.path().join("labels.json"), &self.records)?;
        let dir = self.dir();
        let io_err = |source| StorageError::Io {
            path: dir.clone(),
            source,
        };
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(io_err)?;
        }
        fs::rename(staging.path(), &dir).map_err(io_err)?;
        debug!("committed {} ({} samples)", dir.display(), self.records.len());
        self.records.clear();
        Ok(())
    }

    fn discard(&mut self) {
        // dropping the TempDir removes the staged images
        self.staging = None;
        self.records.clear();
    }
}

pub fn shard_dir_name(shard: usize) -> String {
    format!("shard_{:03}", shard)
}

fn write_image_atomic(
    dir: &Path,
    path: &Path,
    image: &GrayImage,
    format: OutputFormat,
) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let encode_err = |source| StorageError::Encode {
        path: path.to_path_buf(),
        source,
    };
    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    match format {
        OutputFormat::Png => image
            .write_to(file.as_file_mut(), ImageFormat::Png)
            .map_err(encode_err)?,
        OutputFormat::Jpg => {
            let mut out = BufWriter::new(file.as_file_mut());
            JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
                .encode_image(image)
                .map_err(encode_err)?;
            out.flush().map_err(io_err)?;
        }
    }
    file.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

/// Writes a JSON array of label records through a temp file.
pub fn write_labels(path: &Path, records: &[LabelRecord]) -> Result<(), StorageError> {
    let body = serde_json::to_vec_pretty(records).map_err(|source| StorageError::Labels {
        path: path.to_path_buf(),
        source,
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    file.write_all(&body).map_err(io_err)?;
    file.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}

/// Keeps samples in memory; clones share the committed store.
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    samples: Arc<Mutex<Vec<Sample>>>,
    pending: Vec<Sample>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed samples from any clone, ordered by sample index.
    pub fn samples(&self) -> Vec<Sample> {
        let mut samples = self
            .samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        samples.sort_by_key(|sample| sample.metadata.index);
        samples
    }
}

impl DatasetWriter for MemoryWriter {
    fn write(&mut self, sample: Sample) -> WriteResult {
        let filename = format!("{:06}", sample.metadata.index);
        let record = LabelRecord::describe(&sample, filename.clone(), filename);
        self.pending.push(sample);
        Ok(record)
    }

    fn finish(&mut self) -> Result<(), StorageError> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(&mut self.pending);
        Ok(())
    }

    fn discard(&mut self) {
        self.pending.clear();
    }
}
