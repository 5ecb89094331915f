#![allow(dead_code)]

use gsglob::{
    api::{FieldsScope, ListObjectsRequest, StorageApi},
    resource::{BucketResource, ObjectResource, PrefixResource, Resource},
    Error, Result,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

struct Version {
    name: String,
    generation: i64,
    live: bool,
}

/// An in-memory bucket store with the listing semantics of the real service
#[derive(Default)]
pub struct FakeStorage {
    buckets: BTreeMap<String, Vec<Version>>,
    calls: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bucket containing live objects with generation 1
    pub fn bucket(mut self, bucket: &str, objects: &[&str]) -> Self {
        let versions = self.buckets.entry(bucket.to_owned()).or_default();
        versions.extend(objects.iter().map(|name| Version {
            name: (*name).to_owned(),
            generation: 1,
            live: true,
        }));
        self
    }

    /// Adds a new live generation of an object, the previous live generation
    /// becomes noncurrent
    pub fn new_generation(mut self, bucket: &str, name: &str, generation: i64) -> Self {
        let versions = self.buckets.entry(bucket.to_owned()).or_default();
        for v in versions.iter_mut().filter(|v| v.name == name) {
            v.live = false;
        }
        versions.push(Version {
            name: name.to_owned(),
            generation,
            live: true,
        });
        self
    }

    pub fn into_api(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every request made so far, eg. `list b prefix=dir delimiter=/` or
    /// `get b/a.txt`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn versions(&self, bucket: &str) -> Result<&[Version]> {
        self.buckets
            .get(bucket)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NotFound {
                what: format!("gs://{bucket}"),
            })
    }
}

fn object(bucket: &str, v: &Version) -> ObjectResource {
    let mut obj = ObjectResource::new(bucket, &v.name);
    obj.url.generation = Some(v.generation.to_string());
    obj.size = Some(v.name.len() as u64);
    obj
}

#[async_trait::async_trait]
impl StorageApi for FakeStorage {
    async fn list_buckets(&self, _fields: FieldsScope) -> Result<Vec<BucketResource>> {
        self.record("list_buckets".to_owned());
        Ok(self.buckets.keys().map(BucketResource::new).collect())
    }

    async fn get_bucket(&self, name: &str, _fields: FieldsScope) -> Result<BucketResource> {
        self.record(format!("get_bucket {name}"));
        self.versions(name)?;
        Ok(BucketResource::new(name))
    }

    async fn list_objects(&self, req: ListObjectsRequest<'_>) -> Result<Vec<Resource>> {
        self.record(format!(
            "list {} prefix={} delimiter={}",
            req.bucket,
            req.prefix.unwrap_or_default(),
            req.delimiter.map(String::from).unwrap_or_default(),
        ));

        let prefix = req.prefix.unwrap_or_default();

        let mut versions: Vec<_> = self
            .versions(req.bucket)?
            .iter()
            .filter(|v| v.name.starts_with(prefix) && (req.all_versions || v.live))
            .collect();
        versions.sort_by(|a, b| (&a.name, a.generation).cmp(&(&b.name, b.generation)));

        let mut objects = Vec::new();
        let mut prefixes = BTreeSet::new();

        for v in versions {
            let rest = &v.name[prefix.len()..];
            match req.delimiter.and_then(|d| rest.find(d)) {
                Some(ind) => {
                    prefixes.insert(format!("{prefix}{}", &rest[..=ind]));
                }
                None => objects.push(Resource::Object(object(req.bucket, v))),
            }
        }

        objects.extend(
            prefixes
                .into_iter()
                .map(|p| Resource::Prefix(PrefixResource::new(req.bucket, p))),
        );
        Ok(objects)
    }

    async fn get_object_metadata(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<&str>,
        _fields: FieldsScope,
    ) -> Result<ObjectResource> {
        self.record(format!("get {bucket}/{name}"));

        self.versions(bucket)?
            .iter()
            .find(|v| {
                v.name == name
                    && match generation {
                        Some(g) => v.generation.to_string() == g,
                        None => v.live,
                    }
            })
            .map(|v| object(bucket, v))
            .ok_or_else(|| Error::NotFound {
                what: format!("gs://{bucket}/{name}"),
            })
    }
}

/// The versionless url strings of each resource, in order
pub fn urls(resources: &[Resource]) -> Vec<String> {
    resources
        .iter()
        .map(|r| match r.cloud_url() {
            Some(url) => url.versionless_url_string(),
            None => r.to_string(),
        })
        .collect()
}
