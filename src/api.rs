use crate::{
    resource::{BucketResource, ObjectResource, Resource},
    Result,
};

/// Determines the amount of metadata returned by the service
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum FieldsScope {
    /// Only the fields required for listing
    Short,
    /// Everything except access control lists
    #[default]
    NoAcl,
    /// All metadata, including access control lists
    Full,
}

impl FieldsScope {
    #[inline]
    pub fn projection(self) -> tame_gcs::common::Projection {
        match self {
            Self::Short | Self::NoAcl => tame_gcs::common::Projection::NoAcl,
            Self::Full => tame_gcs::common::Projection::Full,
        }
    }

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Short | Self::NoAcl => "noAcl",
            Self::Full => "full",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ListObjectsRequest<'a> {
    pub bucket: &'a str,
    pub prefix: Option<&'a str>,
    pub delimiter: Option<char>,
    pub all_versions: bool,
    pub fields: FieldsScope,
}

/// The operations wildcard expansion needs from a storage service
#[async_trait::async_trait]
pub trait StorageApi: Send + Sync {
    async fn list_buckets(&self, fields: FieldsScope) -> Result<Vec<BucketResource>>;

    async fn get_bucket(&self, name: &str, fields: FieldsScope) -> Result<BucketResource>;

    /// Lists every object and (if a delimiter is specified) prefix matching
    /// the request, following pagination until exhausted
    async fn list_objects(&self, req: ListObjectsRequest<'_>) -> Result<Vec<Resource>>;

    /// Retrieves the metadata for a single object, returning
    /// [`crate::Error::NotFound`] if it does not exist
    async fn get_object_metadata(
        &self,
        bucket: &str,
        object: &str,
        generation: Option<&str>,
        fields: FieldsScope,
    ) -> Result<ObjectResource>;
}

#[async_trait::async_trait]
impl<T: StorageApi + ?Sized> StorageApi for std::sync::Arc<T> {
    async fn list_buckets(&self, fields: FieldsScope) -> Result<Vec<BucketResource>> {
        (**self).list_buckets(fields).await
    }

    async fn get_bucket(&self, name: &str, fields: FieldsScope) -> Result<BucketResource> {
        (**self).get_bucket(name, fields).await
    }

    async fn list_objects(&self, req: ListObjectsRequest<'_>) -> Result<Vec<Resource>> {
        (**self).list_objects(req).await
    }

    async fn get_object_metadata(
        &self,
        bucket: &str,
        object: &str,
        generation: Option<&str>,
        fields: FieldsScope,
    ) -> Result<ObjectResource> {
        (**self)
            .get_object_metadata(bucket, object, generation, fields)
            .await
    }
}
