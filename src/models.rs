use reqwest::Url;
use std::io;
use std::path::Path;

/// BleepingComputer download pages: the first choice button leads to an
/// interstitial page whose meta refresh carries the real file URL.
pub const BLEEPING_COMPUTER_CHAIN: [&str; 2] = [
    ".dl_choices .dl_but_choice:first-of-type a",
    r#"meta[content^="3"]"#,
];

/// One catalogue entry: where to start, how to get from there to a file,
/// and how to name and file it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub start_url: String,
    /// Consumed left to right, one selector per fetched page.
    pub selectors: Vec<String>,
    pub name_prefix: String,
    pub category: Option<String>,
    pub file_type: Option<String>,
}

impl Descriptor {
    /// A link that already points at the file.
    pub fn direct(url: &str, name_prefix: &str, category: &str) -> Self {
        Self {
            start_url: url.to_string(),
            selectors: Vec::new(),
            name_prefix: name_prefix.to_string(),
            category: Some(category.to_string()),
            file_type: None,
        }
    }

    /// A page to crawl through `selectors` before reaching the file.
    pub fn crawl(url: &str, selectors: &[&str], name_prefix: &str, category: &str) -> Self {
        Self {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            ..Self::direct(url, name_prefix, category)
        }
    }

    pub fn bleeping_computer(url: &str, name_prefix: &str, category: &str) -> Self {
        Self::crawl(url, &BLEEPING_COMPUTER_CHAIN, name_prefix, category).with_file_type(".exe")
    }

    pub fn with_file_type(mut self, file_type: &str) -> Self {
        self.file_type = Some(file_type.to_string());
        self
    }

    /// The destination subdirectory, if one was given and is non-empty.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_direct(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// What is on disk at a destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalArtifact {
    Absent,
    Present { size: u64 },
}

impl LocalArtifact {
    pub async fn inspect(path: &Path) -> io::Result<Self> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(LocalArtifact::Present { size: meta.len() }),
            Ok(_) => Ok(LocalArtifact::Absent),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(LocalArtifact::Absent),
            Err(e) => Err(e),
        }
    }

    /// A non-empty local file whose size equals the advertised remote size.
    /// Unknown or zero remote sizes never confirm freshness.
    pub fn is_current(&self, remote_size: Option<u64>) -> bool {
        match (self, remote_size) {
            (LocalArtifact::Present { size }, Some(remote)) => *size > 0 && *size == remote,
            _ => false,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            LocalArtifact::Present { size } => Some(*size),
            LocalArtifact::Absent => None,
        }
    }
}

/// A file as advertised by the server at the end of a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteArtifact {
    pub host: String,
    /// Path including the query string, if any.
    pub path: String,
    pub size: Option<u64>,
}

impl RemoteArtifact {
    pub fn new(url: &Url, size: Option<u64>) -> Self {
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };
        Self {
            host: url.host_str().unwrap_or_default().to_string(),
            path,
            size: size.filter(|s| *s > 0),
        }
    }
}
