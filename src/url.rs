//! Parsing of `gs://` and local file urls, which may contain wildcards

use crate::{Error, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;

/// The delimiter used for cloud object names, and for local paths
pub const DELIMITER: char = '/';

const GS_SCHEME: &str = "gs";
const FILE_SCHEME: &str = "file";

/// Strips one delimiter char from the end of the string, if present
#[inline]
pub fn rstrip_one_delimiter(s: &str) -> &str {
    s.strip_suffix(DELIMITER).unwrap_or(s)
}

/// A `gs://` url, which depending on its contents represents the provider,
/// one or more buckets, or one or more objects
#[derive(Clone, Debug, Default)]
pub struct CloudUrl {
    pub bucket: Option<String>,
    pub object: Option<String>,
    pub generation: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_owned())
}

impl CloudUrl {
    pub fn new(bucket: &str, object: &str, generation: Option<&str>) -> Result<Self> {
        let url = Self {
            bucket: non_empty(bucket),
            object: non_empty(object),
            generation: generation.and_then(non_empty),
        };

        if let Some(obj @ ("." | "..")) = url.object.as_deref() {
            return Err(Error::InvalidUrl(format!(
                "{obj} is an invalid root-level object name."
            )));
        }

        Ok(url)
    }

    fn from_schemeless(url: &str, schemeless: &str) -> Result<Self> {
        if schemeless.starts_with(DELIMITER) {
            return Err(Error::InvalidUrl(format!(
                "Cloud URL scheme should be followed by colon and two slashes: \"://\". Found: \"{url}\""
            )));
        }

        let (bucket, object) = schemeless
            .split_once(DELIMITER)
            .unwrap_or((schemeless, ""));
        let (object, generation) = object.split_once('#').unwrap_or((object, ""));

        Self::new(bucket, object, Some(generation))
    }

    #[inline]
    pub fn is_provider(&self) -> bool {
        self.bucket.is_none()
    }

    #[inline]
    pub fn is_bucket(&self) -> bool {
        self.bucket.is_some() && self.object.is_none()
    }

    #[inline]
    pub fn is_object(&self) -> bool {
        self.bucket.is_some() && self.object.is_some()
    }

    #[inline]
    pub fn bucket_name(&self) -> &str {
        self.bucket.as_deref().unwrap_or_default()
    }

    #[inline]
    pub fn object_name(&self) -> &str {
        self.object.as_deref().unwrap_or_default()
    }

    pub fn versionless_url_string(&self) -> String {
        match (&self.bucket, &self.object) {
            (None, _) => format!("{GS_SCHEME}://"),
            (Some(bucket), None) => format!("{GS_SCHEME}://{bucket}/"),
            (Some(bucket), Some(object)) => format!("{GS_SCHEME}://{bucket}/{object}"),
        }
    }

    pub fn url_string(&self) -> String {
        let mut s = self.versionless_url_string();
        if let Some(generation) = &self.generation {
            s.push('#');
            s.push_str(generation);
        }
        s
    }
}

impl fmt::Display for CloudUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url_string())
    }
}

impl PartialEq for CloudUrl {
    fn eq(&self, other: &Self) -> bool {
        self.url_string() == other.url_string()
    }
}

impl Eq for CloudUrl {}

/// A local filesystem path, which may contain wildcards
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUrl {
    pub path: Utf8PathBuf,
}

impl FileUrl {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        let url = Self { path: path.into() };
        url.warn_if_unsupported_double_wildcard();
        url
    }

    pub fn parse(s: &str) -> Self {
        Self::new(s.strip_prefix("file://").unwrap_or(s))
    }

    /// `**` is only well defined as a whole path segment
    fn warn_if_unsupported_double_wildcard(&self) {
        let path = self.path.as_str();
        if path.is_empty() {
            return;
        }

        let bounded = format!("/{path}/");
        if bounded.split("/**/").collect::<String>().contains("**") {
            tracing::warn!(
                path,
                "** behavior is undefined if directly preceeded or followed by characters other than /"
            );
        }
    }

    #[inline]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns true when stdin/stdout is requested
    #[inline]
    pub fn is_stream(&self) -> bool {
        self.path == "-"
    }

    pub fn is_pipe(&self) -> bool {
        if self.is_stream() {
            return true;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            std::fs::metadata(&self.path)
                .map(|md| md.file_type().is_fifo())
                .unwrap_or(false)
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    #[inline]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.path.is_dir()
    }

    pub fn url_string(&self) -> String {
        format!("{FILE_SCHEME}://{}", self.path)
    }
}

impl fmt::Display for FileUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageUrl {
    Cloud(CloudUrl),
    File(FileUrl),
}

impl StorageUrl {
    pub fn parse(s: &str) -> Result<Self> {
        let Some(ind) = s.find("://") else {
            return Ok(Self::File(FileUrl::parse(s)));
        };

        let scheme = s[..ind].to_ascii_lowercase();
        match scheme.as_str() {
            FILE_SCHEME => Ok(Self::File(FileUrl::new(&s[ind + 3..]))),
            GS_SCHEME => Ok(Self::Cloud(CloudUrl::from_schemeless(s, &s[ind + 3..])?)),
            other => Err(Error::InvalidUrl(format!("Unrecognized scheme \"{other}\""))),
        }
    }

    pub fn url_string(&self) -> String {
        match self {
            Self::Cloud(c) => c.url_string(),
            Self::File(f) => f.url_string(),
        }
    }

    pub fn versionless_url_string(&self) -> String {
        match self {
            Self::Cloud(c) => c.versionless_url_string(),
            Self::File(f) => f.url_string(),
        }
    }

    /// Appends `part` to the url, making sure exactly one delimiter separates
    /// them. Unlike [`std::path::Path::join`], a leading delimiter in `part`
    /// does not replace the url.
    pub fn join(&self, part: &str) -> Result<Self> {
        let versionless = self.versionless_url_string();
        let left = rstrip_one_delimiter(&versionless);
        let right = part.strip_prefix(DELIMITER).unwrap_or(part);

        Self::parse(&format!("{left}{DELIMITER}{right}"))
    }

    #[inline]
    pub fn is_cloud(&self) -> bool {
        matches!(self, Self::Cloud(_))
    }
}

impl fmt::Display for StorageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url_string())
    }
}

impl std::str::FromStr for StorageUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
