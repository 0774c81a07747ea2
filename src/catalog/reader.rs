/*!
 * Streaming catalog decoder
 *
 * Catalog files hold any number of consecutive records: JSON files are a
 * sequence of top-level objects with no enclosing array, YAML files a
 * sequence of `---` documents. Records are decoded one at a time so a large
 * catalog is never held as a single value.
 */

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{CatalogRecord, DeclarativeConfig};
use crate::error::{MirrorError, Result};

/// Read a catalog file, or every catalog file below a directory in name order
pub fn read_catalog(path: &Path) -> Result<DeclarativeConfig> {
    let mut config = DeclarativeConfig::default();

    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| MirrorError::Catalog(e.to_string()))?;
            if entry.file_type().is_file() && catalog_format(entry.path()).is_some() {
                read_file(entry.path(), &mut config)?;
            }
        }
    } else {
        read_file(path, &mut config)?;
    }

    info!(
        "loaded catalog {}: {} packages, {} channels, {} bundles",
        path.display(),
        config.packages.len(),
        config.channels.len(),
        config.bundles.len()
    );
    Ok(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CatalogFormat {
    Json,
    Yaml,
}

fn catalog_format(path: &Path) -> Option<CatalogFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => Some(CatalogFormat::Json),
        Some("yaml") | Some("yml") => Some(CatalogFormat::Yaml),
        _ => None,
    }
}

fn read_file(path: &Path, config: &mut DeclarativeConfig) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    let decoded = match catalog_format(path) {
        Some(CatalogFormat::Yaml) => decode_yaml(reader, config),
        // Files without a known extension are tried as JSON
        _ => decode_json(reader, config),
    }
    .map_err(|e| MirrorError::Catalog(format!("{}: {}", path.display(), e)))?;

    debug!("decoded {} records from {}", decoded, path.display());
    Ok(())
}

/// Decode consecutive JSON records into `config`, returning how many were kept
pub fn decode_json<R: Read>(reader: R, config: &mut DeclarativeConfig) -> Result<usize> {
    let mut kept = 0;
    let stream = serde_json::Deserializer::from_reader(reader).into_iter::<CatalogRecord>();
    for record in stream {
        if config.push(record?) {
            kept += 1;
        }
    }
    Ok(kept)
}

/// Decode `---` separated YAML records into `config`, returning how many were kept
pub fn decode_yaml<R: Read>(reader: R, config: &mut DeclarativeConfig) -> Result<usize> {
    let mut kept = 0;
    for document in serde_yaml::Deserializer::from_reader(reader) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        if config.push(serde_yaml::from_value(value)?) {
            kept += 1;
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const JSON_CATALOG: &str = r#"
{"schema":"olm.package","name":"etcd","defaultChannel":"stable"}
{"schema":"olm.channel","name":"stable","package":"etcd","entries":[{"name":"etcd.v0.9.4"}]}
{
  "schema": "olm.bundle",
  "name": "etcd.v0.9.4",
  "package": "etcd",
  "image": "quay.io/operatorhubio/etcd@sha256:c0301e4686c3ed4206e370b42de5a3bd2229b9fb4906cf85f3f30650424abec2",
  "relatedImages": [{"name": "etcd", "image": "quay.io/coreos/etcd-operator:v0.9.4"}]
}
{"schema":"olm.deprecations","package":"etcd","entries":[]}
"#;

    #[test]
    fn test_decode_json_stream() {
        let mut config = DeclarativeConfig::default();
        let kept = decode_json(JSON_CATALOG.as_bytes(), &mut config).unwrap();
        assert_eq!(kept, 3);
        assert_eq!(config.packages[0].default_channel, "stable");
        assert_eq!(config.bundles[0].related_images.len(), 1);
    }

    #[test]
    fn test_decode_json_reports_malformed_record() {
        let mut config = DeclarativeConfig::default();
        let result = decode_json(
            r#"{"schema":"olm.package","name":"etcd"} {"schema":"olm.bundle""#.as_bytes(),
            &mut config,
        );
        assert!(result.is_err());
        assert_eq!(config.packages.len(), 1);
    }

    #[test]
    fn test_decode_yaml_documents() {
        let yaml = r#"---
schema: olm.package
name: etcd
defaultChannel: alpha
---
schema: olm.channel
name: alpha
package: etcd
entries:
  - name: etcd.v0.9.0
---
"#;
        let mut config = DeclarativeConfig::default();
        let kept = decode_yaml(yaml.as_bytes(), &mut config).unwrap();
        assert_eq!(kept, 2);
        assert_eq!(config.channels[0].entries[0].name, "etcd.v0.9.0");
    }

    #[test]
    fn test_read_catalog_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("etcd")).unwrap();
        fs::write(dir.path().join("etcd/catalog.json"), JSON_CATALOG).unwrap();
        fs::write(
            dir.path().join("etcd/extra.yaml"),
            "schema: olm.channel\nname: alpha\npackage: etcd\n",
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a catalog").unwrap();

        let config = read_catalog(dir.path()).unwrap();
        assert_eq!(config.packages.len(), 1);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.bundles.len(), 1);
    }
}
