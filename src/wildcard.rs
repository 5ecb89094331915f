//! Expansion of cloud and local urls containing `*`, `?`, and `[]` wildcards

mod cloud;
mod file;
pub mod pattern;

pub use cloud::{CloudIteratorOptions, CloudWildcardIterator};
pub use file::FileWildcardIterator;
pub use pattern::contains_wildcard;

use crate::{
    api::StorageApi,
    resource::Resource,
    url::StorageUrl,
    Result,
};
use std::{fmt, sync::Arc};

#[derive(Copy, Clone, Debug, Default)]
pub struct WildcardOptions {
    pub cloud: CloudIteratorOptions,
    /// Skip over local symlinks instead of following them
    pub ignore_symlinks: bool,
}

pub enum WildcardIterator {
    Cloud(CloudWildcardIterator),
    File(FileWildcardIterator),
}

/// Creates the iterator appropriate for the url
pub fn get_wildcard_iterator(
    url: &str,
    client: Arc<dyn StorageApi>,
    opts: WildcardOptions,
) -> Result<WildcardIterator> {
    Ok(WildcardIterator::new(StorageUrl::parse(url)?, client, opts))
}

impl WildcardIterator {
    pub fn new(url: StorageUrl, client: Arc<dyn StorageApi>, opts: WildcardOptions) -> Self {
        match url {
            StorageUrl::Cloud(url) => Self::Cloud(CloudWildcardIterator::new(url, client, opts.cloud)),
            StorageUrl::File(url) => Self::File(FileWildcardIterator::new(url, opts.ignore_symlinks)),
        }
    }

    pub async fn next(&mut self) -> Result<Option<Resource>> {
        match self {
            Self::Cloud(c) => c.next().await,
            Self::File(f) => f.next().await,
        }
    }

    pub fn into_stream(self) -> impl futures_util::Stream<Item = Result<Resource>> + Send {
        futures_util::stream::try_unfold(self, |mut iter| async move {
            Ok(iter.next().await?.map(|res| (res, iter)))
        })
    }

    pub async fn collect(self) -> Result<Vec<Resource>> {
        match self {
            Self::Cloud(c) => c.collect().await,
            Self::File(f) => f.collect().await,
        }
    }
}

impl fmt::Debug for WildcardIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloud(c) => write!(f, "WildcardIterator({})", c.url()),
            Self::File(fi) => write!(f, "WildcardIterator({})", fi.url()),
        }
    }
}
