//! Hypervisor backed by a JSON snapshot of domain statistics.
//!
//! The file is read again on each connection, so it can be updated while
//! the exporter runs:
//!
//! ```json
//! [
//!   {
//!     "uuid": "2f2a8b8c-3c3f-4b7e-9d52-6b0c7c7a1e01",
//!     "name": "instance-0001",
//!     "stats": { "cpu.time": 100, "block.0.name": "vda" }
//!   }
//! ]
//! ```
use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::Deserialize;
use uuid::Uuid;

use super::{Connection, DomainHandle, Hypervisor, RawStats};
use crate::{
    error::{Error, Result},
    metrics::NumberValue,
    stats::RawStatValue,
};

fn default_active() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
pub struct SnapshotDomain {
    pub uuid: Uuid,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Domain XML description, a minimal one is generated when missing.
    #[serde(default)]
    pub xml: Option<String>,
    #[serde(default)]
    pub stats: IndexMap<String, serde_json::Value>,
}

impl DomainHandle for SnapshotDomain {
    fn uuid(&self) -> Result<Uuid> {
        Ok(self.uuid)
    }

    fn name(&self) -> Result<String> {
        Ok(self.name.clone())
    }

    fn xml_desc(&self) -> Result<String> {
        Ok(self.xml.clone().unwrap_or_else(|| {
            format!(
                "<domain><name>{}</name><uuid>{}</uuid></domain>",
                self.name
                    .replace('&', "&amp;")
                    .replace('<', "&lt;")
                    .replace('>', "&gt;"),
                self.uuid.as_hyphenated()
            )
        }))
    }
}

fn json_to_raw(key: &str, value: &serde_json::Value) -> Option<RawStatValue> {
    use serde_json::Value;

    match value {
        Value::Number(n) => {
            let number = if let Some(i) = n.as_i64() {
                NumberValue::Int64(i)
            } else if let Some(u) = n.as_u64() {
                u.into()
            } else {
                NumberValue::Double(n.as_f64()?)
            };

            Some(RawStatValue::Number(number))
        }
        Value::Bool(b) => Some((*b).into()),
        Value::String(s) => Some(s.as_str().into()),
        _ => {
            tracing::warn!("Ignoring unsupported snapshot value for {key}");
            None
        }
    }
}

impl SnapshotDomain {
    fn raw_stats(&self) -> RawStats {
        self.stats
            .iter()
            .filter_map(|(key, value)| Some((key.as_str().into(), json_to_raw(key, value)?)))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct SnapshotHypervisor {
    path: PathBuf,
}

impl SnapshotHypervisor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[derive(Debug)]
pub struct SnapshotConnection {
    domains: Vec<SnapshotDomain>,
}

impl Hypervisor for SnapshotHypervisor {
    type Connection = SnapshotConnection;

    fn open(&self, uri: Option<&str>) -> Result<SnapshotConnection> {
        if let Some(uri) = uri {
            tracing::debug!("Ignoring uri {uri} for snapshot {}", self.path.display());
        }

        let text = fs::read_to_string(&self.path)
            .map_err(|e| Error::Connection(format!("{}: {e}", self.path.display())))?;

        let domains = serde_json::from_str(&text)
            .map_err(|e| Error::Connection(format!("{}: {e}", self.path.display())))?;

        Ok(SnapshotConnection { domains })
    }
}

impl Connection for SnapshotConnection {
    type Domain = SnapshotDomain;

    fn all_active_domain_stats(&self) -> Result<Vec<(SnapshotDomain, RawStats)>> {
        Ok(self
            .domains
            .iter()
            .filter(|domain| domain.active)
            .map(|domain| (domain.clone(), domain.raw_stats()))
            .collect())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    const SNAPSHOT: &str = r#"[
        {
            "uuid": "2f2a8b8c-3c3f-4b7e-9d52-6b0c7c7a1e01",
            "name": "instance-0001",
            "stats": {
                "cpu.time": 100,
                "balloon.rss": 18446744073709551615,
                "cpu.ratio": 0.25,
                "block.0.name": "vda",
                "vcpu.0.halted": false,
                "bogus": null
            }
        },
        {
            "uuid": "7bd2f0a2-5d61-4cb2-a1a8-0d1a6f9d3b02",
            "name": "stopped",
            "active": false
        }
    ]"#;

    fn snapshot_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn active_domains_only() {
        let file = snapshot_file(SNAPSHOT);
        let connection = SnapshotHypervisor::new(file.path()).open(None).unwrap();

        let domains = connection.all_active_domain_stats().unwrap();
        assert_eq!(domains.len(), 1);

        let (domain, stats) = &domains[0];
        assert_eq!(domain.name().unwrap(), "instance-0001");
        let expected: RawStats = vec![
            ("cpu.time".into(), RawStatValue::from(100i64)),
            ("balloon.rss".into(), RawStatValue::from(u64::MAX)),
            ("cpu.ratio".into(), RawStatValue::from(0.25)),
            ("block.0.name".into(), RawStatValue::from("vda")),
            ("vcpu.0.halted".into(), RawStatValue::from(false)),
        ];
        assert_eq!(stats, &expected);
    }

    #[test]
    fn generated_xml() {
        let file = snapshot_file(SNAPSHOT);
        let connection = SnapshotHypervisor::new(file.path()).open(None).unwrap();
        let (domain, _) = connection.all_active_domain_stats().unwrap().remove(0);

        assert_eq!(
            domain.xml_desc().unwrap(),
            "<domain><name>instance-0001</name><uuid>2f2a8b8c-3c3f-4b7e-9d52-6b0c7c7a1e01</uuid></domain>"
        );
    }

    #[test]
    fn unreadable_snapshot() {
        let missing = SnapshotHypervisor::new("/nonexistent/snapshot.json").open(None);
        assert!(matches!(missing, Err(Error::Connection(_))));

        let file = snapshot_file("{ not json");
        let invalid = SnapshotHypervisor::new(file.path()).open(None);
        assert!(matches!(invalid, Err(Error::Connection(_))));
    }
}
