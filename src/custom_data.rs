//! Custom tag and attribute vocabulary.
//!
//! Data sources are JSON documents describing tags, their attributes and the
//! values those attributes accept. Each configured source becomes one
//! [`CustomDataProvider`]; a source that cannot be read or parsed becomes an
//! empty provider so the remaining sources still load. Sources are local
//! paths, `file://` URLs or `http(s)://` URLs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tower_lsp::lsp_types::{MarkupContent, MarkupKind, Url};

use crate::errors::CustomDataError;

/// Plain text or markup documentation attached to a tag, attribute or value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Description {
    Plain(String),
    Markup(MarkupContent),
}

impl Description {
    pub fn to_markup(&self) -> MarkupContent {
        match self {
            Self::Plain(text) => MarkupContent {
                kind: MarkupKind::PlainText,
                value: text.clone(),
            },
            Self::Markup(markup) => markup.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValueData {
    pub name: String,
    #[serde(default)]
    pub description: Option<Description>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValueSet {
    pub name: String,
    #[serde(default)]
    pub values: Vec<ValueData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeData {
    pub name: String,
    #[serde(default)]
    pub description: Option<Description>,
    /// Name of a shared [`ValueSet`] listing the accepted values.
    #[serde(default)]
    pub value_set: Option<String>,
    #[serde(default)]
    pub values: Vec<ValueData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagData {
    pub name: String,
    #[serde(default)]
    pub description: Option<Description>,
    #[serde(default)]
    pub attributes: Vec<AttributeData>,
    /// Whether the element never has content or an end tag.
    #[serde(default)]
    pub void: bool,
}

/// Root of a custom data JSON document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlData {
    #[serde(default)]
    pub version: Option<f64>,
    #[serde(default)]
    pub tags: Vec<TagData>,
    #[serde(default)]
    pub global_attributes: Vec<AttributeData>,
    #[serde(default)]
    pub value_sets: Vec<ValueSet>,
}

/// Vocabulary loaded from one data source.
#[derive(Debug, Clone)]
pub struct CustomDataProvider {
    id: String,
    data: HtmlData,
}

impl CustomDataProvider {
    pub fn new(id: impl Into<String>, data: HtmlData) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// A provider contributing nothing, standing in for a source that failed to load.
    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, HtmlData::default())
    }

    /// Parse the JSON `content` of the source `id`.
    pub fn parse(id: &str, content: &str) -> Result<Self, CustomDataError> {
        let data = serde_json::from_str(content).map_err(|source| CustomDataError::Parse {
            location: id.to_string(),
            source,
        })?;
        Ok(Self::new(id, data))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_empty(&self) -> bool {
        self.data.tags.is_empty() && self.data.global_attributes.is_empty()
    }

    pub fn tags(&self) -> &[TagData] {
        &self.data.tags
    }

    /// Tag definition by case-insensitive name.
    pub fn tag(&self, name: &str) -> Option<&TagData> {
        self.data
            .tags
            .iter()
            .find(|tag| tag.name.eq_ignore_ascii_case(name))
    }

    /// Attributes of `tag` followed by the global attributes.
    pub fn attributes(&self, tag: &str) -> Vec<&AttributeData> {
        self.tag(tag)
            .into_iter()
            .flat_map(|t| t.attributes.iter())
            .chain(self.data.global_attributes.iter())
            .collect()
    }

    /// Values accepted by `attribute` on `tag`, inline values first, then the
    /// attribute's value set.
    pub fn values(&self, tag: &str, attribute: &str) -> Vec<&ValueData> {
        let mut result = Vec::new();
        for attr in self.attributes(tag) {
            if !attr.name.eq_ignore_ascii_case(attribute) {
                continue;
            }
            result.extend(attr.values.iter());
            if let Some(set_name) = &attr.value_set {
                if let Some(set) = self.data.value_sets.iter().find(|s| &s.name == set_name) {
                    result.extend(set.values.iter());
                }
            }
        }
        result
    }
}

/// Fetches the content of a data source.
pub trait DataSourceReader {
    fn read(&self, location: &str) -> Result<String, CustomDataError>;
}

/// Reads local paths and `file://` URLs; relative paths resolve against `base`.
#[derive(Debug, Clone)]
pub struct FileSystemReader {
    base: PathBuf,
}

impl FileSystemReader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, location: &str) -> Result<PathBuf, CustomDataError> {
        if location.contains("://") {
            let unsupported = || CustomDataError::UnsupportedScheme {
                location: location.to_string(),
            };
            let url = Url::parse(location).map_err(|_| unsupported())?;
            if url.scheme() != "file" {
                return Err(unsupported());
            }
            return url.to_file_path().map_err(|_| unsupported());
        }
        let path = Path::new(location);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.base.join(path))
        }
    }
}

impl DataSourceReader for FileSystemReader {
    fn read(&self, location: &str) -> Result<String, CustomDataError> {
        let path = self.resolve(location)?;
        std::fs::read_to_string(&path).map_err(|source| CustomDataError::Read {
            location: location.to_string(),
            source,
        })
    }
}

/// Whether `location` is fetched over the network.
fn is_remote(location: &str) -> bool {
    Url::parse(location).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Fetches `http` and `https` sources.
#[derive(Debug, Clone)]
pub struct HttpReader {
    agent: ureq::Agent,
}

impl HttpReader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl Default for HttpReader {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl DataSourceReader for HttpReader {
    fn read(&self, location: &str) -> Result<String, CustomDataError> {
        if !is_remote(location) {
            return Err(CustomDataError::UnsupportedScheme {
                location: location.to_string(),
            });
        }
        let response = self
            .agent
            .get(location)
            .call()
            .map_err(|e| CustomDataError::Fetch {
                location: location.to_string(),
                source: Box::new(e),
            })?;
        response
            .into_string()
            .map_err(|source| CustomDataError::Read {
                location: location.to_string(),
                source,
            })
    }
}

/// Reads remote sources over HTTP and everything else from the file system.
#[derive(Debug, Clone)]
pub struct SourceReader {
    local: FileSystemReader,
    remote: HttpReader,
}

impl SourceReader {
    /// Reader resolving relative paths against `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            local: FileSystemReader::new(base),
            remote: HttpReader::default(),
        }
    }
}

impl DataSourceReader for SourceReader {
    fn read(&self, location: &str) -> Result<String, CustomDataError> {
        if is_remote(location) {
            self.remote.read(location)
        } else {
            self.local.read(location)
        }
    }
}

/// Load one provider per source, in source order.
///
/// A source that fails to load is logged and replaced by an empty provider.
pub fn load_custom_data(
    sources: &[String],
    reader: &dyn DataSourceReader,
) -> Vec<CustomDataProvider> {
    sources
        .iter()
        .map(|location| {
            let loaded = reader
                .read(location)
                .and_then(|content| CustomDataProvider::parse(location, &content));
            match loaded {
                Ok(provider) => {
                    tracing::debug!(
                        source = %location,
                        tags = provider.tags().len(),
                        "loaded custom data"
                    );
                    provider
                }
                Err(e) => {
                    tracing::warn!("{e}");
                    CustomDataProvider::empty(location.as_str())
                }
            }
        })
        .collect()
}
