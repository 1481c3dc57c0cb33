//! Domain labels extracted from the libvirt domain XML description.
//!
//! The label map is a YAML document mapping label names to XPath
//! expressions, along with the XML namespaces these expressions use:
//!
//! ```yaml
//! namespaces:
//!   nova: http://openstack.org/xmlns/libvirt/nova/1.0
//! labels:
//!   nova_flavor: /domain/metadata/nova:instance/nova:flavor/@name
//! ```
use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use sxd_document::parser;
use sxd_xpath::{Context, Factory, Value, XPath};

use crate::{
    error::{Error, Result},
    metrics::Label,
};

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LabelMap {
    /// label name -> xpath
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    /// prefix -> namespace uri
    #[serde(default)]
    pub namespaces: IndexMap<String, String>,
}

fn xpath_error(label: &str, path: &str, reason: String) -> Error {
    Error::XPath {
        label: label.into(),
        path: path.into(),
        reason,
    }
}

fn compile(factory: &Factory, label: &str, path: &str) -> Result<XPath> {
    factory
        .build(path)
        .map_err(|e| xpath_error(label, path, format!("{e:?}")))?
        .ok_or_else(|| xpath_error(label, path, "empty expression".into()))
}

/// First value of an XPath result, `None` when it selects nothing.
fn first_value(value: Value<'_>) -> Option<String> {
    match value {
        Value::Nodeset(nodes) => nodes.document_order_first().map(|node| node.string_value()),
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
    }
}

impl LabelMap {
    pub fn from_yaml(path: &Path, text: &str) -> Result<Self> {
        let map: Self = serde_yaml::from_str(text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        map.validate()?;

        Ok(map)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(path, &text)
    }

    /// Check that all expressions compile.
    pub fn validate(&self) -> Result<()> {
        self.compile().map(|_| ())
    }

    /// Compile every expression, for use over a whole collection pass.
    pub fn compile(&self) -> Result<LabelExtractor<'_>> {
        let factory = Factory::new();
        let xpaths = self
            .labels
            .iter()
            .map(|(label, path)| compile(&factory, label, path))
            .collect::<Result<_>>()?;

        Ok(LabelExtractor { map: self, xpaths })
    }

    /// Evaluate every expression against `xml`.
    pub fn extract(&self, xml: &str) -> Result<Vec<Label>> {
        self.compile()?.extract(xml)
    }
}

/// The compiled expressions of a [LabelMap].
#[derive(Debug)]
pub struct LabelExtractor<'a> {
    map: &'a LabelMap,
    /// One per entry of `map.labels`, in the same order.
    xpaths: Vec<XPath>,
}

impl LabelExtractor<'_> {
    /// Evaluate every expression against `xml`.
    ///
    /// Expressions selecting nothing don't produce a label.
    pub fn extract(&self, xml: &str) -> Result<Vec<Label>> {
        let package = parser::parse(xml).map_err(|e| Error::Xml(format!("{e:?}")))?;
        let document = package.as_document();

        let mut context = Context::new();
        for (prefix, uri) in &self.map.namespaces {
            context.set_namespace(prefix, uri);
        }

        let mut labels = Vec::with_capacity(self.xpaths.len());

        for ((label, path), xpath) in self.map.labels.iter().zip(&self.xpaths) {
            let value = xpath
                .evaluate(&context, document.root())
                .map_err(|e| xpath_error(label, path, format!("{e:?}")))?;

            match first_value(value) {
                Some(value) => labels.push(Label::new(label.as_str(), value)),
                None => tracing::debug!("No match for label {label} ({path})"),
            }
        }

        Ok(labels)
    }
}
