//! On-disk risk model artifacts.
//!
//! One file per feature schema version. The artifact is a `postcard`
//! envelope, written to a temporary file and renamed into place, so readers
//! see either the previous artifact or the new one.

use super::RiskModel;
use crate::errors::{Error, Result, ResultExt};
use crate::features::FeatureSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const MAGIC: [u8; 4] = *b"TIRM";
const FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u16,
    schema: FeatureSchema,
    model: RiskModel,
}

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, schema: FeatureSchema) -> PathBuf {
        self.dir
            .join(format!("risk_model.schema-{}.bin", schema.version))
    }

    pub fn save(&self, model: &RiskModel) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).context(format!("creating {}", self.dir.display()))?;
        let path = self.path_for(model.schema());
        let envelope = Envelope {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            schema: model.schema(),
            model: model.clone(),
        };
        let bytes = postcard::to_allocvec(&envelope).map_err(|e| Error::ModelFormat {
            path: path.clone(),
            message: format!("encoding failed: {}", e),
        })?;

        let tmp = self
            .dir
            .join(format!(".risk_model.{}.tmp", std::process::id()));
        std::fs::write(&tmp, &bytes).context(format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &path).context(format!("replacing {}", path.display()))?;
        info!(path = %path.display(), version = model.version(), bytes = bytes.len(), "saved risk model");
        Ok(path)
    }

    /// Load the artifact for `schema`. `Ok(None)` when none exists.
    pub fn load(&self, schema: FeatureSchema) -> Result<Option<RiskModel>> {
        let path = self.path_for(schema);
        if !path.exists() {
            debug!(path = %path.display(), "no model artifact");
            return Ok(None);
        }
        let bytes = std::fs::read(&path).context(format!("reading {}", path.display()))?;
        decode(&path, &bytes, schema).map(Some)
    }
}

fn decode(path: &Path, bytes: &[u8], schema: FeatureSchema) -> Result<RiskModel> {
    let format_error = |message: String| Error::ModelFormat {
        path: path.to_path_buf(),
        message,
    };

    let envelope: Envelope =
        postcard::from_bytes(bytes).map_err(|e| format_error(format!("decoding failed: {}", e)))?;
    if envelope.magic != MAGIC {
        return Err(format_error("not a risk model artifact".to_string()));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(format_error(format!(
            "unsupported format version {}",
            envelope.format_version
        )));
    }
    if envelope.schema != schema || envelope.model.schema() != schema {
        return Err(Error::schema_mismatch(schema, envelope.model.schema()));
    }
    Ok(envelope.model)
}
