//! Higher level object operations built on top of [`GcsClient`]

use crate::{
    api::{FieldsScope, ListObjectsRequest, StorageApi},
    gcs::{object_from_metadata, GcsClient, UploadProgress},
    resource::{ObjectResource, Resource},
    url::CloudUrl,
    Error, Result,
};
use camino::Utf8Path;

/// Chunk sizes must be a multiple of 256KiB
pub const CHUNK_GRANULARITY: u64 = 256 * 1024;
/// Used when no chunk size is configured
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
/// Chunks are held in memory, so larger configured sizes are clamped to this
pub const MAX_CHUNK_SIZE: u64 = 1024 * 1024 * 1024;

/// Rounds the configured chunk size up to the nearest multiple of
/// [`CHUNK_GRANULARITY`], `0` selects the default
pub fn chunk_size(configured: u64) -> u64 {
    match configured {
        0 => DEFAULT_CHUNK_SIZE,
        cs => {
            let rem = cs % CHUNK_GRANULARITY;
            let rounded = if rem == 0 {
                Some(cs)
            } else {
                cs.checked_add(CHUNK_GRANULARITY - rem)
            };

            rounded.map_or(MAX_CHUNK_SIZE, |cs| cs.min(MAX_CHUNK_SIZE))
        }
    }
}

fn guess_mime(path: &Utf8Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}

/// Fills `buf` from the file, only returning less than its length at the end
/// of the file
async fn read_chunk(file: &mut tokio::fs::File, buf: &mut [u8]) -> Result<usize> {
    use tokio::io::AsyncReadExt;

    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

async fn file_size(path: &Utf8Path) -> Result<u64> {
    tokio::fs::metadata(path)
        .await
        .map(|md| md.len())
        .map_err(|_| Error::BadFile(format!("[{path}] not found or not accessible")))
}

#[derive(Clone)]
pub struct StorageClient {
    gcs: GcsClient,
    chunk_size: usize,
}

impl StorageClient {
    pub fn new(gcs: GcsClient, configured_chunk_size: u64) -> Self {
        Self {
            gcs,
            chunk_size: chunk_size(configured_chunk_size) as usize,
        }
    }

    #[inline]
    pub fn api(&self) -> &GcsClient {
        &self.gcs
    }

    /// Copies one object to another in a single request
    pub async fn copy(&self, src: &CloudUrl, dst: &CloudUrl) -> Result<ObjectResource> {
        self.gcs.copy_object(src, dst).await
    }

    /// Copies one object to another, unlike [`Self::copy`] this can handle
    /// large objects that would time out a single copy request
    pub async fn rewrite(&self, src: &CloudUrl, dst: &CloudUrl) -> Result<ObjectResource> {
        let mut token = None;

        loop {
            let res = self
                .gcs
                .rewrite_object(src, dst, token.as_deref())
                .await?;

            if res.done {
                let md = res.resource.ok_or_else(|| {
                    Error::BadFile(format!("rewrite of {src} completed without a resource"))
                })?;
                return Ok(object_from_metadata(dst.bucket_name(), md));
            }

            tracing::debug!(%src, %dst, "rewrite in progress");

            // Without a token the rewrite would restart from the beginning
            match res.rewrite_token {
                Some(next) => token = Some(next),
                None => {
                    return Err(Error::IncompleteRewrite {
                        src: src.to_string(),
                        dst: dst.to_string(),
                    })
                }
            }
        }
    }

    pub async fn get_object(&self, obj: &CloudUrl) -> Result<ObjectResource> {
        self.gcs
            .get_object_metadata(
                obj.bucket_name(),
                obj.object_name(),
                obj.generation.as_deref(),
                FieldsScope::NoAcl,
            )
            .await
    }

    /// Uploads a local file, verifying the size of the created object matches
    /// the local file
    pub async fn copy_file_to_gcs(
        &self,
        bucket: &str,
        local_path: &Utf8Path,
        target_path: &str,
    ) -> Result<ObjectResource> {
        let size = file_size(local_path).await?;
        let remote = format!("{bucket}/{target_path}");

        tracing::info!(local = %local_path, %remote, size, "uploading");

        let obj = match self.upload(bucket, local_path, target_path, size).await {
            Ok(obj) => obj,
            Err(Error::NotFound { .. }) => {
                return Err(Error::BucketNotFound {
                    bucket: bucket.to_owned(),
                })
            }
            Err(err) => match err.status() {
                Some(code) => {
                    tracing::debug!(local = %local_path, %remote, error = %err, "upload failed");
                    return Err(Error::Upload {
                        code,
                        local: local_path.to_string(),
                        remote,
                        message: err.status_message(),
                    });
                }
                None => return Err(err),
            },
        };

        if obj.size != Some(size) {
            tracing::debug!(
                remote_size = ?obj.size,
                local_size = size,
                "uploaded size does not match local file"
            );
            return Err(Error::BadFile(format!(
                "Cloud storage upload failure. Uploaded file does not match local file: {local_path}. Please retry."
            )));
        }

        Ok(obj)
    }

    /// Sends the file in chunks of the configured size via a resumable upload
    async fn upload(
        &self,
        bucket: &str,
        local_path: &Utf8Path,
        target_path: &str,
        size: u64,
    ) -> Result<ObjectResource> {
        use tokio::io::AsyncSeekExt;

        let session = self
            .gcs
            .start_resumable_upload(bucket, target_path, &guess_mime(local_path), size)
            .await?;

        let mut file = tokio::fs::File::open(local_path).await?;
        let mut buf = vec![0u8; self.chunk_size.min(usize::try_from(size).unwrap_or(usize::MAX))];
        let mut offset = 0;

        loop {
            let read = read_chunk(&mut file, &mut buf).await?;

            if read == 0 && offset < size {
                return Err(Error::BadFile(format!(
                    "[{local_path}] was truncated during upload"
                )));
            }

            let chunk = bytes::Bytes::copy_from_slice(&buf[..read]);
            match self
                .gcs
                .upload_chunk(&session, bucket, chunk, offset, size)
                .await?
            {
                UploadProgress::Done(obj) => return Ok(obj),
                UploadProgress::Incomplete { persisted } => {
                    if persisted <= offset || read == 0 {
                        return Err(Error::BadFile(format!(
                            "upload of [{local_path}] stalled at byte {persisted}"
                        )));
                    }

                    // The service may persist less than was sent
                    if persisted != offset + read as u64 {
                        file.seek(std::io::SeekFrom::Start(persisted)).await?;
                    }
                    offset = persisted;
                }
            }
        }
    }

    /// Downloads an object to a local file, verifying the size of the file
    /// matches the object. A generation selects a specific version rather
    /// than the live one.
    pub async fn copy_file_from_gcs(
        &self,
        bucket: &str,
        object_path: &str,
        generation: Option<&str>,
        local_path: &Utf8Path,
    ) -> Result<()> {
        let remote = format!("{bucket}/{object_path}");
        tracing::info!(%remote, ?generation, local = %local_path, "downloading");

        let expected = async {
            self.download_to(bucket, object_path, generation, local_path)
                .await?;
            self.gcs
                .get_object_metadata(bucket, object_path, generation, FieldsScope::NoAcl)
                .await
        }
        .await
        .map_err(|err| {
            Error::BadFile(format!(
                "Could not copy [{remote}] to [{local_path}]. Please retry: {err}"
            ))
        })?;

        let size = file_size(local_path).await?;
        if expected.size != Some(size) {
            tracing::debug!(
                local_size = size,
                remote_size = ?expected.size,
                "downloaded size does not match object"
            );
            return Err(Error::BadFile(format!(
                "Cloud Storage download failure. Downloaded file [{local_path}] does not match Cloud Storage object. Please retry."
            )));
        }

        Ok(())
    }

    async fn download_to(
        &self,
        bucket: &str,
        object: &str,
        generation: Option<&str>,
        local_path: &Utf8Path,
    ) -> Result<()> {
        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        let res = self.gcs.download_object(bucket, object, generation).await?;

        let file = tokio::fs::File::create(local_path).await?;
        let mut writer = tokio::io::BufWriter::with_capacity(self.chunk_size, file);

        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            writer.write_all(&chunk?).await?;
        }

        writer.flush().await?;
        Ok(())
    }

    /// Reads the entire contents of an object into memory
    pub async fn read_object(&self, obj: &CloudUrl) -> Result<bytes::Bytes> {
        tracing::info!(%obj, "reading");

        let res = self
            .gcs
            .download_object(
                obj.bucket_name(),
                obj.object_name(),
                obj.generation.as_deref(),
            )
            .await
            .map_err(|err| Error::BadFile(format!("Could not read [{obj}]. Please retry: {err}")))?;

        Ok(res.bytes().await?)
    }

    /// Creates the bucket, if the bucket already exists it is then retrieved
    /// to verify we actually have access to it, as the service returns a 409
    /// regardless of who owns it
    pub async fn create_bucket_if_not_exists(&self, bucket: &str, project: Option<&str>) -> Result<()> {
        match self.gcs.insert_bucket(bucket, project).await {
            Ok(_) => Ok(()),
            Err(Error::Conflict { .. }) => {
                self.gcs.get_bucket(bucket, FieldsScope::NoAcl).await?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Lists every object in the bucket whose name begins with the prefix
    pub async fn list_bucket(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<ObjectResource>> {
        let listed = self
            .gcs
            .list_objects(ListObjectsRequest {
                bucket,
                prefix,
                ..Default::default()
            })
            .await
            .map_err(|err| match err {
                Error::NotFound { .. } => Error::BucketNotFound {
                    bucket: bucket.to_owned(),
                },
                err => match err.status() {
                    Some(code) => {
                        tracing::debug!(bucket, error = %err, "could not list bucket");
                        Error::ListBucket {
                            code,
                            bucket: bucket.to_owned(),
                            message: err.status_message(),
                        }
                    }
                    None => err,
                },
            })?;

        Ok(listed
            .into_iter()
            .filter_map(|res| match res {
                Resource::Object(obj) => Some(obj),
                _ => None,
            })
            .collect())
    }

    pub async fn delete_object(&self, obj: &CloudUrl) -> Result<()> {
        self.gcs
            .delete_object(
                obj.bucket_name(),
                obj.object_name(),
                obj.generation.as_deref(),
            )
            .await
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.gcs.delete_bucket(bucket).await
    }

    /// Checks that a `<subdir>/` directory marker object exists in the bucket,
    /// creating an empty one if it doesn't, so that listing an empty
    /// directory still works
    pub async fn ensure_subdir_exists(&self, bucket: &str, subdir: &str) -> Result<()> {
        let marker = format!("{subdir}/");

        match self
            .gcs
            .get_object_metadata(bucket, &marker, None, FieldsScope::Short)
            .await
        {
            Ok(_) => Ok(()),
            Err(Error::NotFound { .. }) => {
                tracing::debug!(bucket, %marker, "creating directory marker");
                self.gcs
                    .insert_object(bucket, &marker, Vec::new(), "application/octet-stream")
                    .await
                    .map(|_| ())
                    .map_err(|err| {
                        Error::BadFile(format!(
                            "Error re-creating empty {subdir}/ directory. List calls may fail, but importing will restore the directory: {err}"
                        ))
                    })
            }
            Err(err) => Err(err),
        }
    }
}
