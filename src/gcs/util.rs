use crate::{Error, Result};
use tame_gcs::{self as tgcs, http};

const GCS_ORIGIN: &str = "https://storage.googleapis.com";
/// The hosts tame-gcs builds requests against
const GCS_ORIGINS: &[&str] = &[GCS_ORIGIN, "https://www.googleapis.com"];

#[derive(serde::Deserialize)]
struct ApiErrorBody {
    error: ApiErrorInner,
}

#[derive(serde::Deserialize)]
struct ApiErrorInner {
    message: String,
}

/// Converts a non-success response into an error, preferring the message in
/// the JSON error body
pub(crate) fn status_to_error(status: http::StatusCode, body: &[u8], what: &str) -> Error {
    match status {
        http::StatusCode::NOT_FOUND => Error::NotFound {
            what: what.to_owned(),
        },
        http::StatusCode::CONFLICT => Error::Conflict {
            what: what.to_owned(),
        },
        status => {
            let message = serde_json::from_slice::<ApiErrorBody>(body)
                .map(|aeb| aeb.error.message)
                .or_else(|_| String::from_utf8(body.to_vec()))
                .unwrap_or_else(|_| format!("failed to retrieve error for {status}"));

            Error::Http { status, message }
        }
    }
}

#[derive(Clone)]
pub struct RequestContext {
    pub client: reqwest::Client,
    pub obj: tgcs::objects::Object,
    /// Replaces the scheme and authority of every request, eg. to target an
    /// emulator
    pub endpoint: Option<url::Url>,
}

impl RequestContext {
    /// The base url for the JSON API
    pub fn origin(&self) -> &str {
        self.endpoint
            .as_ref()
            .map_or(GCS_ORIGIN, |u| u.as_str().trim_end_matches('/'))
    }

    fn rebase(&self, uri: &http::Uri) -> String {
        let uri = uri.to_string();
        if self.endpoint.is_none() {
            return uri;
        }

        GCS_ORIGINS
            .iter()
            .find_map(|origin| uri.strip_prefix(*origin))
            .map_or_else(|| uri.clone(), |path| format!("{}{path}", self.origin()))
    }

    /// Builds a JSON API url, percent encoding each path segment
    pub fn api_url(&self, segments: &[&str]) -> Result<url::Url> {
        self.url_under(&["storage", "v1"], segments)
    }

    /// Builds a media upload url, eg. `upload/storage/v1/b/<bucket>/o`
    pub fn upload_url(&self, segments: &[&str]) -> Result<url::Url> {
        self.url_under(&["upload", "storage", "v1"], segments)
    }

    fn url_under(&self, base: &[&str], segments: &[&str]) -> Result<url::Url> {
        let mut url = url::Url::parse(self.origin())
            .map_err(|err| Error::InvalidUrl(format!("invalid endpoint: {err}")))?;

        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("invalid endpoint: {}", self.origin())))?
            .pop_if_empty()
            .extend(base)
            .extend(segments);

        Ok(url)
    }
}

/// Converts a vanilla `http::Request` into a `reqwest::Request`
fn convert_request<B>(req: http::Request<B>, ctx: &RequestContext) -> Result<reqwest::Request>
where
    B: std::io::Read + Send + 'static,
{
    let (parts, mut body) = req.into_parts();

    let uri = ctx.rebase(&parts.uri);
    let client = &ctx.client;

    let builder = match parts.method {
        http::Method::GET => client.get(&uri),
        http::Method::POST => client.post(&uri),
        http::Method::DELETE => client.delete(&uri),
        http::Method::PATCH => client.patch(&uri),
        http::Method::PUT => client.put(&uri),
        method => {
            return Err(Error::InvalidUrl(format!("'{method}' not implemented")));
        }
    };

    let content_len = tame_gcs::util::get_content_length(&parts.headers).unwrap_or(0);
    let mut buffer = bytes::BytesMut::with_capacity(content_len);

    let mut block = [0u8; 8 * 1024];

    loop {
        let read = body.read(&mut block)?;

        if read > 0 {
            buffer.extend_from_slice(&block[..read]);
        } else {
            break;
        }
    }

    Ok(builder
        .headers(parts.headers)
        .body(buffer.freeze())
        .build()?)
}

/// Converts a `reqwest::Response` into a vanilla `http::Response`. This currently copies
/// the entire response body into a single buffer with no streaming
async fn convert_response(res: reqwest::Response) -> Result<http::Response<bytes::Bytes>> {
    let mut builder = http::Response::builder()
        .status(res.status())
        .version(res.version());

    if let Some(headers) = builder.headers_mut() {
        headers.extend(
            res.headers()
                .into_iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    let content_len = res.content_length().unwrap_or_default() as usize;
    let mut buffer = bytes::BytesMut::with_capacity(content_len);

    let mut stream = res.bytes_stream();

    use bytes::BufMut;
    use futures_util::StreamExt;

    while let Some(item) = stream.next().await {
        buffer.put(item?);
    }

    Ok(builder.body(buffer.freeze())?)
}

/// Sends a GCS request, returning the raw response if it was successful
pub async fn send<B>(
    ctx: &RequestContext,
    req: http::Request<B>,
    what: &str,
) -> Result<reqwest::Response>
where
    B: std::io::Read + Send + 'static,
{
    let request = convert_request(req, ctx)?;
    tracing::debug!(method = %request.method(), url = %request.url(), "sending request");

    let response = ctx.client.execute(request).await?;
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else {
        let body = response.bytes().await?;
        Err(status_to_error(status, &body, what))
    }
}

/// Executes a GCS request via a reqwest client and returns the parsed response/API error
pub async fn execute<B, R>(ctx: &RequestContext, req: http::Request<B>, what: &str) -> Result<R>
where
    R: tgcs::ApiResponse<bytes::Bytes>,
    B: std::io::Read + Send + 'static,
{
    let response = send(ctx, req, what).await?;
    let response = convert_response(response).await?;

    Ok(R::try_from_parts(response)?)
}

/// Executes a JSON API request that tame-gcs has no builder for
pub async fn execute_json<R>(rb: reqwest::RequestBuilder, what: &str) -> Result<R>
where
    R: serde::de::DeserializeOwned,
{
    let res = rb.send().await?;

    let status = res.status();
    let body = res.bytes().await?;

    if status.is_success() {
        // Some calls (eg. DELETE) return an empty body
        let body: &[u8] = if body.is_empty() { b"null" } else { &body };
        Ok(serde_json::from_slice(body)?)
    } else {
        Err(status_to_error(status, &body, what))
    }
}
