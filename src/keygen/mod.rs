//! Cache key generation.
//!
//! Three generators compose into a fallback chain: a template generator
//! rendering build metadata, a content-hash generator, and a static
//! path-join generator that cannot fail. The chain always yields a
//! non-empty key for well-formed inputs.

use crate::error::{CachetError, CachetResult};
use crate::metadata::Metadata;
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use tera::{Context, Tera, Value};
use tracing::warn;

/// A cache key generator.
///
/// `parts` carry the fallback material (mount paths and branch); whether a
/// generator uses them is its own business.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, parts: &[String]) -> CachetResult<String>;
}

/// Renders a user-supplied template against the build metadata.
///
/// Templates reference metadata fields (`{{ repo.name }}`,
/// `{{ commit.branch }}`, `{{ build.number }}`) and the helper functions
/// `checksum(path=...)`, `epoch()`, `arch()` and `os()`. An empty or
/// malformed template is an error, never a silently empty key.
pub struct TemplateGenerator {
    template: String,
    metadata: Metadata,
}

impl TemplateGenerator {
    pub fn new(template: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            template: template.into(),
            metadata,
        }
    }

    fn engine() -> Tera {
        let mut tera = Tera::default();
        tera.register_function("checksum", checksum_fn);
        tera.register_function("epoch", epoch_fn);
        tera.register_function("arch", arch_fn);
        tera.register_function("os", os_fn);
        tera
    }
}

impl KeyGenerator for TemplateGenerator {
    fn generate(&self, _parts: &[String]) -> CachetResult<String> {
        if self.template.trim().is_empty() {
            return Err(CachetError::KeyTemplateInvalid {
                reason: "cache key template is empty".to_string(),
            });
        }

        let mut tera = Self::engine();
        tera.add_raw_template("cache_key", &self.template)
            .map_err(|e| CachetError::KeyTemplateInvalid {
                reason: e.to_string(),
            })?;

        let context = Context::from_serialize(&self.metadata).map_err(|e| {
            CachetError::KeyTemplateInvalid {
                reason: e.to_string(),
            }
        })?;

        let key = tera
            .render("cache_key", &context)
            .map_err(|e| CachetError::KeyTemplateInvalid {
                reason: e.to_string(),
            })?;

        let key = key.trim().to_string();
        if key.is_empty() {
            return Err(CachetError::KeyTemplateInvalid {
                reason: "template rendered an empty key".to_string(),
            });
        }

        Ok(key)
    }
}

/// Hashes the concatenated parts into a 32-hex-character (128-bit) key.
pub struct HashGenerator;

impl KeyGenerator for HashGenerator {
    fn generate(&self, parts: &[String]) -> CachetResult<String> {
        Ok(hash_parts(parts))
    }
}

/// Last-resort generator: a plain path join of the parts.
pub struct StaticGenerator;

impl KeyGenerator for StaticGenerator {
    fn generate(&self, parts: &[String]) -> CachetResult<String> {
        Ok(parts
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.trim_matches('/'))
            .collect::<Vec<_>>()
            .join("/"))
    }
}

/// The fallback chain: primary, then the configured fallback, then the
/// static default constructed here once and passed down explicitly.
pub struct KeyChain {
    primary: Box<dyn KeyGenerator>,
    fallback: Option<Box<dyn KeyGenerator>>,
    last_resort: StaticGenerator,
}

impl KeyChain {
    pub fn new(primary: Box<dyn KeyGenerator>, fallback: Option<Box<dyn KeyGenerator>>) -> Self {
        Self {
            primary,
            fallback,
            last_resort: StaticGenerator,
        }
    }

    /// Generate a key, falling through the chain on failure.
    pub fn generate(&self, parts: &[String]) -> CachetResult<String> {
        match self.primary.generate(parts) {
            Ok(key) => return Ok(key),
            Err(err) => warn!(error = %err, "key generator failed, falling back"),
        }

        if let Some(fallback) = &self.fallback {
            match fallback.generate(parts) {
                Ok(key) => return Ok(key),
                Err(err) => warn!(error = %err, "fallback key generator failed"),
            }
        }

        self.last_resort.generate(parts)
    }
}

/// md5 over the given parts, hex encoded.
pub(crate) fn hash_parts(parts: &[String]) -> String {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn checksum_fn(args: &HashMap<String, Value>) -> tera::Result<Value> {
    let path = args.get("path").and_then(Value::as_str).unwrap_or_default();

    match file_checksum(Path::new(path)) {
        Ok(sum) => Ok(Value::String(sum)),
        Err(err) => {
            // mirror the metadata fields: a bad checksum input degrades the
            // key instead of failing the whole template
            warn!(path, error = %err, "checksum helper could not hash file");
            Ok(Value::String(String::new()))
        }
    }
}

fn epoch_fn(_args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(chrono::Utc::now().timestamp().to_string()))
}

fn arch_fn(_args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(std::env::consts::ARCH.to_string()))
}

fn os_fn(_args: &HashMap<String, Value>) -> tera::Result<Value> {
    Ok(Value::String(std::env::consts::OS.to_string()))
}
