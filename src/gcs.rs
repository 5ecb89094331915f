//! [`StorageApi`] implementation over the Cloud Storage JSON API

mod util;

use crate::{
    api::{FieldsScope, ListObjectsRequest, StorageApi},
    resource::{BucketResource, ObjectResource, PrefixResource, Resource},
    url::CloudUrl,
    Error, Result,
};
use tame_gcs::{self as tgcs, objects::Metadata};

pub use util::RequestContext;

/// Converts object metadata returned by the service into a resource
pub fn object_from_metadata(bucket: &str, md: Metadata) -> ObjectResource {
    ObjectResource {
        url: CloudUrl {
            bucket: Some(md.bucket.unwrap_or_else(|| bucket.to_owned())),
            object: md.name,
            generation: md.generation.map(|g| g.to_string()),
        },
        size: md.size,
        content_type: md.content_type,
        crc32c: md.crc32c,
        md5: md.md5_hash,
        updated: md.updated,
        metageneration: md.metageneration,
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketJson {
    name: String,
    location: Option<String>,
    storage_class: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    time_created: Option<time::OffsetDateTime>,
}

impl From<BucketJson> for BucketResource {
    fn from(b: BucketJson) -> Self {
        Self {
            location: b.location,
            storage_class: b.storage_class,
            created: b.time_created,
            ..BucketResource::new(b.name)
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<BucketJson>,
    next_page_token: Option<String>,
}

/// <https://cloud.google.com/storage/docs/json_api/v1/objects/rewrite>
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteResponse {
    pub done: bool,
    pub rewrite_token: Option<String>,
    pub resource: Option<Metadata>,
}

/// The state of a resumable upload after a chunk has been sent
#[derive(Debug)]
pub enum UploadProgress {
    /// The service has persisted the first `persisted` bytes
    Incomplete { persisted: u64 },
    Done(ObjectResource),
}

/// Parses a `bytes=0-<last>` range into the number of bytes it covers
fn persisted_bytes(range: &str) -> Option<u64> {
    let (_, last) = range.strip_prefix("bytes=")?.split_once('-')?;
    last.parse::<u64>().ok()?.checked_add(1)
}

#[inline]
fn object_ids<'a>(
    bucket: &'a str,
    object: &'a str,
) -> Result<(tgcs::BucketName<'a>, tgcs::ObjectName<'a>)> {
    Ok((
        tgcs::BucketName::try_from(bucket)?,
        tgcs::ObjectName::try_from(object)?,
    ))
}

fn parse_generation(generation: Option<&str>) -> Result<Option<i64>> {
    generation
        .map(|g| {
            g.parse()
                .map_err(|_| Error::InvalidUrl(format!("invalid generation '{g}'")))
        })
        .transpose()
}

#[derive(Clone)]
pub struct GcsClient {
    ctx: RequestContext,
    /// The project used when listing and creating buckets
    project: Option<String>,
}

impl GcsClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: Option<url::Url>,
        project: Option<String>,
    ) -> Self {
        Self {
            ctx: RequestContext {
                client,
                obj: tgcs::objects::Object::default(),
                endpoint,
            },
            project,
        }
    }

    #[inline]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    fn require_project<'p>(&'p self, project: Option<&'p str>) -> Result<&'p str> {
        project.or(self.project.as_deref()).ok_or_else(|| {
            Error::InvalidUrl(
                "a project is required, set --project or CLOUDSDK_CORE_PROJECT".to_owned(),
            )
        })
    }

    /// Uploads `content` as a single multipart request
    pub async fn insert_object(
        &self,
        bucket: &str,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectResource> {
        let bucket_name = tgcs::BucketName::try_from(bucket)?;
        let len = content.len() as u64;

        let md = Metadata {
            name: Some(name.to_owned()),
            content_type: Some(content_type.to_owned()),
            ..Default::default()
        };

        let req = self.ctx.obj.insert_multipart(
            &bucket_name,
            std::io::Cursor::new(content),
            len,
            &md,
            None,
        )?;

        let what = format!("gs://{bucket}");
        let res: tgcs::objects::InsertResponse = util::execute(&self.ctx, req, &what).await?;
        Ok(object_from_metadata(bucket, res.metadata))
    }

    /// Starts a resumable upload session, returning the session url that the
    /// content is then sent to in chunks
    ///
    /// <https://cloud.google.com/storage/docs/performing-resumable-uploads>
    pub async fn start_resumable_upload(
        &self,
        bucket: &str,
        name: &str,
        content_type: &str,
        len: u64,
    ) -> Result<url::Url> {
        let mut url = self.ctx.upload_url(&["b", bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "resumable")
            .append_pair("name", name);

        let what = format!("gs://{bucket}/{name}");
        tracing::debug!(%what, len, "starting resumable upload");

        let res = self
            .ctx
            .client
            .post(url)
            .header("x-upload-content-type", content_type)
            .header("x-upload-content-length", len)
            .json(&serde_json::json!({ "name": name, "contentType": content_type }))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.bytes().await?;
            return Err(util::status_to_error(status, &body, &what));
        }

        let location = res
            .headers()
            .get(http::header::LOCATION)
            .and_then(|loc| loc.to_str().ok())
            .ok_or_else(|| Error::Http {
                status,
                message: format!("no upload session was returned for {what}"),
            })?;

        url::Url::parse(location)
            .map_err(|err| Error::InvalidUrl(format!("invalid upload session '{location}': {err}")))
    }

    /// Sends one chunk of a resumable upload starting at `offset`. Every chunk
    /// but the last must be a multiple of 256KiB.
    pub async fn upload_chunk(
        &self,
        session: &url::Url,
        bucket: &str,
        chunk: bytes::Bytes,
        offset: u64,
        total: u64,
    ) -> Result<UploadProgress> {
        let range = if chunk.is_empty() {
            format!("bytes */{total}")
        } else {
            format!("bytes {offset}-{}/{total}", offset + chunk.len() as u64 - 1)
        };

        tracing::debug!(%range, "uploading chunk");

        let res = self
            .ctx
            .client
            .put(session.clone())
            .header(http::header::CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await?;

        let status = res.status();
        // 308 Resume Incomplete, the Range header holds what was persisted
        if status == http::StatusCode::PERMANENT_REDIRECT {
            let persisted = res
                .headers()
                .get(http::header::RANGE)
                .and_then(|r| r.to_str().ok())
                .and_then(persisted_bytes)
                .unwrap_or(0);

            return Ok(UploadProgress::Incomplete { persisted });
        }

        let body = res.bytes().await?;
        if !status.is_success() {
            return Err(util::status_to_error(
                status,
                &body,
                &format!("gs://{bucket}"),
            ));
        }

        let md: Metadata = serde_json::from_slice(&body)?;
        Ok(UploadProgress::Done(object_from_metadata(bucket, md)))
    }

    /// Starts a download of the object, returning the response so the body
    /// can be streamed
    pub async fn download_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<&str>,
    ) -> Result<reqwest::Response> {
        let id = object_ids(bucket, name)?;
        let req = self.ctx.obj.download(
            &(&id.0, &id.1),
            Some(tgcs::objects::DownloadObjectOptional {
                generation: parse_generation(generation)?,
                ..Default::default()
            }),
        )?;

        util::send(&self.ctx, req, &format!("gs://{bucket}/{name}")).await
    }

    pub async fn delete_object(
        &self,
        bucket: &str,
        name: &str,
        generation: Option<&str>,
    ) -> Result<()> {
        let id = object_ids(bucket, name)?;
        let req = self.ctx.obj.delete(
            &(&id.0, &id.1),
            Some(tgcs::objects::DeleteObjectOptional {
                generation: parse_generation(generation)?,
                ..Default::default()
            }),
        )?;

        let _res: tgcs::objects::DeleteObjectResponse =
            util::execute(&self.ctx, req, &format!("gs://{bucket}/{name}")).await?;
        Ok(())
    }

    /// Issues a single rewrite request, which may need to be repeated with the
    /// returned token until it is done
    pub async fn rewrite_object(
        &self,
        src: &CloudUrl,
        dst: &CloudUrl,
        rewrite_token: Option<&str>,
    ) -> Result<RewriteResponse> {
        let mut url = self.ctx.api_url(&[
            "b",
            src.bucket_name(),
            "o",
            src.object_name(),
            "rewriteTo",
            "b",
            dst.bucket_name(),
            "o",
            dst.object_name(),
        ])?;

        {
            let mut query = url.query_pairs_mut();
            if let Some(token) = rewrite_token {
                query.append_pair("rewriteToken", token);
            }
            if let Some(generation) = &src.generation {
                query.append_pair("sourceGeneration", generation);
            }
        }

        util::execute_json(
            self.ctx.client.post(url).json(&serde_json::json!({})),
            &src.to_string(),
        )
        .await
    }

    /// Copies an object in a single request
    pub async fn copy_object(&self, src: &CloudUrl, dst: &CloudUrl) -> Result<ObjectResource> {
        let mut url = self.ctx.api_url(&[
            "b",
            src.bucket_name(),
            "o",
            src.object_name(),
            "copyTo",
            "b",
            dst.bucket_name(),
            "o",
            dst.object_name(),
        ])?;

        if let Some(generation) = &src.generation {
            url.query_pairs_mut()
                .append_pair("sourceGeneration", generation);
        }

        let md: Metadata = util::execute_json(
            self.ctx.client.post(url).json(&serde_json::json!({})),
            &src.to_string(),
        )
        .await?;

        Ok(object_from_metadata(dst.bucket_name(), md))
    }

    /// <https://cloud.google.com/storage/docs/json_api/v1/buckets/insert>
    pub async fn insert_bucket(&self, name: &str, project: Option<&str>) -> Result<BucketResource> {
        let project = self.require_project(project)?;
        let mut url = self.ctx.api_url(&["b"])?;
        url.query_pairs_mut().append_pair("project", project);

        let bucket: BucketJson = util::execute_json(
            self.ctx
                .client
                .post(url)
                .json(&serde_json::json!({ "name": name })),
            &format!("gs://{name}"),
        )
        .await?;

        Ok(bucket.into())
    }

    /// <https://cloud.google.com/storage/docs/json_api/v1/buckets/delete>
    pub async fn delete_bucket(&self, name: &str) -> Result<()> {
        let url = self.ctx.api_url(&["b", name])?;
        util::execute_json::<()>(self.ctx.client.delete(url), &format!("gs://{name}")).await
    }
}

#[async_trait::async_trait]
impl StorageApi for GcsClient {
    async fn list_buckets(&self, fields: FieldsScope) -> Result<Vec<BucketResource>> {
        let project = self.require_project(None)?;

        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.ctx.api_url(&["b"])?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("project", project)
                    .append_pair("projection", fields.as_str());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            tracing::debug!(project, "listing buckets");
            let page: BucketList =
                util::execute_json(self.ctx.client.get(url), "gs://").await?;

            buckets.extend(page.items.into_iter().map(BucketResource::from));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(buckets)
    }

    async fn get_bucket(&self, name: &str, fields: FieldsScope) -> Result<BucketResource> {
        let mut url = self.ctx.api_url(&["b", name])?;
        url.query_pairs_mut()
            .append_pair("projection", fields.as_str());

        let bucket: BucketJson =
            util::execute_json(self.ctx.client.get(url), &format!("gs://{name}")).await?;
        Ok(bucket.into())
    }

    async fn list_objects(&self, req: ListObjectsRequest<'_>) -> Result<Vec<Resource>> {
        let bucket = tgcs::BucketName::try_from(req.bucket)?;
        let delimiter = req.delimiter.map(String::from);
        let what = format!("gs://{}", req.bucket);

        let mut resources = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            tracing::debug!(
                bucket = req.bucket,
                prefix = ?req.prefix,
                delimiter = ?req.delimiter,
                versions = req.all_versions,
                "listing objects"
            );

            let list_req = self.ctx.obj.list(
                &bucket,
                Some(tgcs::objects::ListOptional {
                    delimiter: delimiter.as_deref(),
                    prefix: req.prefix,
                    page_token: page_token.as_deref(),
                    versions: req.all_versions,
                    projection: Some(req.fields.projection()),
                    ..Default::default()
                }),
            )?;

            let page: tgcs::objects::ListResponse =
                util::execute(&self.ctx, list_req, &what).await?;

            resources.extend(
                page.objects
                    .into_iter()
                    .map(|md| Resource::Object(object_from_metadata(req.bucket, md))),
            );
            resources.extend(
                page.prefixes
                    .into_iter()
                    .map(|p| Resource::Prefix(PrefixResource::new(req.bucket, p))),
            );

            match page.page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(resources)
    }

    async fn get_object_metadata(
        &self,
        bucket: &str,
        object: &str,
        generation: Option<&str>,
        fields: FieldsScope,
    ) -> Result<ObjectResource> {
        let id = object_ids(bucket, object)?;

        tracing::debug!(bucket, object, generation, "getting object metadata");

        let req = self.ctx.obj.get(
            &(&id.0, &id.1),
            Some(tgcs::objects::GetObjectOptional {
                generation: parse_generation(generation)?,
                projection: Some(fields.projection()),
                ..Default::default()
            }),
        )?;

        let res: tgcs::objects::GetObjectResponse =
            util::execute(&self.ctx, req, &format!("gs://{bucket}/{object}")).await?;
        Ok(object_from_metadata(bucket, res.metadata))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_persisted_ranges() {
        assert_eq!(persisted_bytes("bytes=0-262143"), Some(262144));
        assert_eq!(persisted_bytes("bytes=0-0"), Some(1));
        assert_eq!(persisted_bytes("items=0-5"), None);
        assert_eq!(persisted_bytes("bytes=0-"), None);
    }

    #[test]
    fn generations_must_be_numbers() {
        assert_eq!(parse_generation(Some("42")).unwrap(), Some(42));
        assert_eq!(parse_generation(None).unwrap(), None);
        assert!(matches!(parse_generation(Some("abc")), Err(Error::InvalidUrl(_))));
    }
}
