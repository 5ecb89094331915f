use super::pattern::{self, CloudWildcardParts};
use crate::{
    api::{FieldsScope, ListObjectsRequest, StorageApi},
    resource::Resource,
    url::{rstrip_one_delimiter, CloudUrl, DELIMITER},
    Error, Result,
};
use std::{collections::VecDeque, sync::Arc};

#[derive(Copy, Clone, Debug, Default)]
pub struct CloudIteratorOptions {
    /// Yield every version of matching objects rather than just the live one
    pub all_versions: bool,
    pub fields_scope: FieldsScope,
    /// Perform a bucket GET for bucket urls without wildcards, otherwise they
    /// are yielded as [`Resource::Unknown`] without verifying they exist
    pub get_bucket_metadata: bool,
}

/// The object names still needing expansion within a single bucket
struct Expansion {
    bucket: String,
    names: VecDeque<String>,
    /// Reported once every name in the bucket has been expanded
    deferred: Option<Error>,
}

enum Stage {
    Start,
    Objects {
        buckets: VecDeque<String>,
        current: Option<Expansion>,
    },
    Done,
}

/// Lazily expands a `gs://` url containing wildcards into the buckets,
/// objects, and prefixes it matches
pub struct CloudWildcardIterator {
    url: CloudUrl,
    client: Arc<dyn StorageApi>,
    opts: CloudIteratorOptions,
    stage: Stage,
    ready: VecDeque<Resource>,
}

impl CloudWildcardIterator {
    pub fn new(url: CloudUrl, client: Arc<dyn StorageApi>, opts: CloudIteratorOptions) -> Self {
        let compress = |s: Option<String>| s.map(|s| pattern::compress_wildcards(&s).into_owned());

        let url = CloudUrl {
            bucket: compress(url.bucket),
            object: compress(url.object),
            generation: url.generation,
        };

        Self {
            url,
            client,
            opts,
            stage: Stage::Start,
            ready: VecDeque::new(),
        }
    }

    #[inline]
    pub fn url(&self) -> &CloudUrl {
        &self.url
    }

    /// Retrieves the next matching resource, or `None` once the expansion is
    /// exhausted
    pub async fn next(&mut self) -> Result<Option<Resource>> {
        loop {
            if let Some(res) = self.ready.pop_front() {
                return Ok(Some(res));
            }

            match std::mem::replace(&mut self.stage, Stage::Done) {
                Stage::Start => {
                    if self.url.is_provider() {
                        let buckets = self.client.list_buckets(self.opts.fields_scope).await?;
                        self.ready.extend(buckets.into_iter().map(Resource::Bucket));
                        continue;
                    }

                    let buckets = self.fetch_buckets().await?;

                    if self.url.is_bucket() {
                        self.ready.extend(buckets);
                    } else {
                        self.stage = Stage::Objects {
                            buckets: buckets
                                .iter()
                                .filter_map(|b| b.cloud_url())
                                .map(|u| u.bucket_name().to_owned())
                                .collect(),
                            current: None,
                        };
                    }
                }
                Stage::Objects {
                    mut buckets,
                    current,
                } => {
                    // The stage stays `Done` across each await, so an error
                    // finishes the iterator
                    let current = match current {
                        Some(mut exp) => match exp.names.pop_front() {
                            Some(name) => {
                                self.expand_name(&mut exp, &name).await?;
                                Some(exp)
                            }
                            None => {
                                if let Some(err) = exp.deferred {
                                    return Err(err);
                                }
                                None
                            }
                        },
                        None => {
                            let Some(bucket) = buckets.pop_front() else {
                                continue;
                            };

                            self.fetch_objects(bucket).await?
                        }
                    };

                    self.stage = Stage::Objects { buckets, current };
                }
                Stage::Done => return Ok(None),
            }
        }
    }

    /// Drains the iterator into a `Stream`
    pub fn into_stream(self) -> impl futures_util::Stream<Item = Result<Resource>> + Send {
        futures_util::stream::try_unfold(self, |mut iter| async move {
            Ok(iter.next().await?.map(|res| (res, iter)))
        })
    }

    /// Collects every remaining resource
    pub async fn collect(mut self) -> Result<Vec<Resource>> {
        let mut all = Vec::new();
        while let Some(res) = self.next().await? {
            all.push(res);
        }
        Ok(all)
    }

    async fn fetch_buckets(&self) -> Result<Vec<Resource>> {
        let bucket = self.url.bucket_name();

        if pattern::contains_wildcard(bucket) {
            let regex = pattern::compile(bucket)?;
            let buckets = self.client.list_buckets(self.opts.fields_scope).await?;

            Ok(buckets
                .into_iter()
                .filter(|b| regex.is_match(b.name()))
                .map(Resource::Bucket)
                .collect())
        } else if self.url.is_bucket() && self.opts.get_bucket_metadata {
            let bucket = self
                .client
                .get_bucket(bucket, self.opts.fields_scope)
                .await?;
            Ok(vec![Resource::Bucket(bucket)])
        } else {
            // Avoids an API call
            Ok(vec![Resource::Unknown(CloudUrl {
                bucket: Some(bucket.to_owned()),
                ..Default::default()
            })])
        }
    }

    /// Matches an object name that does not need expansion
    async fn try_get_object_directly(&self, bucket: &str, name: &str) -> Result<Option<Resource>> {
        match self
            .client
            .get_object_metadata(
                bucket,
                name,
                self.url.generation.as_deref(),
                self.opts.fields_scope,
            )
            .await
        {
            Ok(obj) => Ok(Some(Resource::Object(obj))),
            // The object does not exist, but it could still be a prefix
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn fetch_objects(&mut self, bucket: String) -> Result<Option<Expansion>> {
        let object_name = self.url.object_name().to_owned();
        let trailing_delimiter = object_name.ends_with(DELIMITER);
        let has_wildcard = pattern::contains_wildcard(&object_name);

        let needs_expansion = has_wildcard || self.opts.all_versions || trailing_delimiter;

        if !needs_expansion {
            if let Some(obj) = self.try_get_object_directly(&bucket, &object_name).await? {
                self.ready.push_back(obj);
                return Ok(None);
            }
        }

        let name = if trailing_delimiter {
            if !has_wildcard {
                // The object with the trailing delimiter is yielded in addition
                // to the prefix of the same name
                if let Some(obj) = self.try_get_object_directly(&bucket, &object_name).await? {
                    self.ready.push_back(obj);
                }
            }

            // Forces the service to return the prefix rather than its contents
            rstrip_one_delimiter(&object_name).to_owned()
        } else {
            object_name
        };

        Ok(Some(Expansion {
            bucket,
            names: VecDeque::from([name]),
            deferred: None,
        }))
    }

    async fn expand_name(&mut self, exp: &mut Expansion, name: &str) -> Result<()> {
        let parts = CloudWildcardParts::from_str(name, DELIMITER);

        tracing::debug!(
            bucket = %exp.bucket,
            prefix = %parts.prefix,
            filter = %parts.filter_pattern,
            delimiter = ?parts.delimiter,
            suffix = ?parts.suffix,
            "expanding wildcard"
        );

        let listed = self
            .client
            .list_objects(ListObjectsRequest {
                bucket: &exp.bucket,
                prefix: (!parts.prefix.is_empty()).then_some(parts.prefix.as_str()),
                delimiter: parts.delimiter,
                all_versions: self.opts.all_versions || self.url.generation.is_some(),
                fields: self.opts.fields_scope,
            })
            .await?;

        let patterns =
            pattern::regex_patterns_for(&format!("{}{}", parts.prefix, parts.filter_pattern))?;
        let original_is_prefix = self.url.object_name().ends_with(DELIMITER);

        for res in listed {
            if let Some(generation) = &self.url.generation {
                if res.generation() != Some(generation.as_str()) {
                    continue;
                }
            }

            let path = res.object_name();
            if !patterns.iter().any(|p| p.is_match(path)) {
                continue;
            }

            match &parts.suffix {
                Some(suffix) => {
                    // There are more wildcards to expand below this prefix,
                    // eg. a/b1c/ + d/e*f/g.txt
                    if let Resource::Prefix(_) = &res {
                        if pattern::contains_wildcard(path) {
                            exp.deferred = Some(Error::InvalidUrl(format!(
                                "Cloud folders named with wildcards are not supported. API returned {res}"
                            )));
                        } else {
                            exp.names.push_back(format!("{path}{suffix}"));
                        }
                    }
                }
                None => {
                    // A query for a prefix, eg. gs://b/f*/, must not yield
                    // gs://b/f.txt
                    if original_is_prefix && !path.ends_with(DELIMITER) {
                        continue;
                    }

                    self.ready.push_back(res);
                }
            }
        }

        Ok(())
    }
}
