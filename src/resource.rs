use crate::url::{CloudUrl, FileUrl};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketResource {
    pub url: CloudUrl,
    pub location: Option<String>,
    pub storage_class: Option<String>,
    pub created: Option<time::OffsetDateTime>,
}

impl BucketResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            url: CloudUrl {
                bucket: Some(name.into()),
                ..Default::default()
            },
            location: None,
            storage_class: None,
            created: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.url.bucket_name()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectResource {
    /// The url of the object, including its generation when known
    pub url: CloudUrl,
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub crc32c: Option<String>,
    pub md5: Option<String>,
    pub updated: Option<time::OffsetDateTime>,
    pub metageneration: Option<i64>,
}

impl ObjectResource {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: CloudUrl {
                bucket: Some(bucket.into()),
                object: Some(name.into()),
                generation: None,
            },
            ..Default::default()
        }
    }

    #[inline]
    pub fn bucket(&self) -> &str {
        self.url.bucket_name()
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.url.object_name()
    }
}

/// A "folder" returned by a delimited object listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixResource {
    pub url: CloudUrl,
    pub prefix: String,
}

impl PrefixResource {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            url: CloudUrl {
                bucket: Some(bucket.into()),
                object: Some(prefix.clone()),
                generation: None,
            },
            prefix,
        }
    }
}

/// Any item yielded by wildcard expansion
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    Bucket(BucketResource),
    Object(ObjectResource),
    Prefix(PrefixResource),
    /// A bucket url which has not been verified to exist
    Unknown(CloudUrl),
    FileObject(FileUrl),
    FileDirectory(FileUrl),
}

/// Borrowed view of a resource's url
pub enum ResourceUrl<'r> {
    Cloud(&'r CloudUrl),
    File(&'r FileUrl),
}

impl Resource {
    pub fn url(&self) -> ResourceUrl<'_> {
        match self {
            Self::Bucket(b) => ResourceUrl::Cloud(&b.url),
            Self::Object(o) => ResourceUrl::Cloud(&o.url),
            Self::Prefix(p) => ResourceUrl::Cloud(&p.url),
            Self::Unknown(u) => ResourceUrl::Cloud(u),
            Self::FileObject(f) | Self::FileDirectory(f) => ResourceUrl::File(f),
        }
    }

    /// The cloud url of the resource, or `None` for local files
    pub fn cloud_url(&self) -> Option<&CloudUrl> {
        match self.url() {
            ResourceUrl::Cloud(c) => Some(c),
            ResourceUrl::File(_) => None,
        }
    }

    /// The object name, prefix, or local path this resource points to
    pub fn object_name(&self) -> &str {
        match self.url() {
            ResourceUrl::Cloud(c) => c.object_name(),
            ResourceUrl::File(f) => f.path.as_str(),
        }
    }

    #[inline]
    pub fn generation(&self) -> Option<&str> {
        self.cloud_url().and_then(|c| c.generation.as_deref())
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Bucket(_) | Self::Prefix(_) | Self::Unknown(_) | Self::FileDirectory(_)
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url() {
            ResourceUrl::Cloud(c) => c.fmt(f),
            ResourceUrl::File(fu) => fu.fmt(f),
        }
    }
}
