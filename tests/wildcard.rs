mod common;

use common::{urls, FakeStorage};
use futures_util::TryStreamExt;
use gsglob::{
    api::StorageApi,
    resource::Resource,
    wildcard::{get_wildcard_iterator, CloudIteratorOptions, WildcardOptions},
    Error,
};
use std::sync::Arc;

async fn expand(api: Arc<dyn StorageApi>, url: &str) -> Vec<String> {
    expand_with(api, url, WildcardOptions::default()).await
}

async fn expand_with(api: Arc<dyn StorageApi>, url: &str, opts: WildcardOptions) -> Vec<String> {
    let matched = get_wildcard_iterator(url, api, opts)
        .unwrap()
        .collect()
        .await
        .unwrap();
    urls(&matched)
}

fn all_versions() -> WildcardOptions {
    WildcardOptions {
        cloud: CloudIteratorOptions {
            all_versions: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn bucket() -> FakeStorage {
    FakeStorage::new().bucket(
        "bucket",
        &[
            "a.txt",
            "b.txt",
            "c.json",
            "dir1/a.txt",
            "dir1/sub/a.txt",
            "dir1/sub/b.json",
            "dir2/a.txt",
            "dir2/b.txt",
        ],
    )
}

#[tokio::test]
async fn single_level_wildcard() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api.clone(), "gs://bucket/*.txt").await,
        ["gs://bucket/a.txt", "gs://bucket/b.txt"]
    );
    assert_eq!(
        api.calls(),
        ["list bucket prefix= delimiter=/"],
        "a single delimited listing should be enough"
    );
}

#[tokio::test]
async fn yields_objects_and_prefixes() {
    let api = bucket().into_api();

    let matched = get_wildcard_iterator("gs://bucket/dir1/*", api, WildcardOptions::default())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(
        urls(&matched),
        ["gs://bucket/dir1/a.txt", "gs://bucket/dir1/sub/"]
    );
    assert!(matches!(matched[0], Resource::Object(_)));
    assert!(matches!(matched[1], Resource::Prefix(_)));
}

#[tokio::test]
async fn double_star_lists_flat() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api.clone(), "gs://bucket/dir1/**").await,
        [
            "gs://bucket/dir1/a.txt",
            "gs://bucket/dir1/sub/a.txt",
            "gs://bucket/dir1/sub/b.json",
        ]
    );
    assert_eq!(api.calls(), ["list bucket prefix=dir1/ delimiter="]);
}

#[tokio::test]
async fn double_star_matches_zero_folders() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api, "gs://bucket/**/a.txt").await,
        [
            "gs://bucket/a.txt",
            "gs://bucket/dir1/a.txt",
            "gs://bucket/dir1/sub/a.txt",
            "gs://bucket/dir2/a.txt",
        ]
    );
}

#[tokio::test]
async fn expands_wildcards_in_folders() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api.clone(), "gs://bucket/dir*/a.txt").await,
        ["gs://bucket/dir1/a.txt", "gs://bucket/dir2/a.txt"]
    );

    // One listing for the folder wildcard, then one for each matched folder
    let calls = api.calls();
    assert_eq!(calls[0], "list bucket prefix=dir delimiter=/");
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn multiple_wildcard_levels() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api, "gs://bucket/d*/s*/*.json").await,
        ["gs://bucket/dir1/sub/b.json"]
    );
}

#[tokio::test]
async fn many_stars_are_compressed() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api, "gs://bucket/dir2/****").await,
        ["gs://bucket/dir2/a.txt", "gs://bucket/dir2/b.txt"]
    );
}

#[tokio::test]
async fn gets_objects_directly() {
    let api = bucket().into_api();

    assert_eq!(
        expand(api.clone(), "gs://bucket/dir1/a.txt").await,
        ["gs://bucket/dir1/a.txt"]
    );
    assert_eq!(api.calls(), ["get bucket/dir1/a.txt"]);
}

#[tokio::test]
async fn missing_object_falls_back_to_prefix() {
    let api = bucket().into_api();

    let matched = get_wildcard_iterator("gs://bucket/dir1", api.clone(), Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(urls(&matched), ["gs://bucket/dir1/"]);
    assert!(matches!(matched[0], Resource::Prefix(_)));
    assert_eq!(
        api.calls(),
        ["get bucket/dir1", "list bucket prefix=dir1 delimiter=/"]
    );

    assert!(expand(api, "gs://bucket/nope").await.is_empty());
}

#[tokio::test]
async fn trailing_delimiter_only_matches_prefixes() {
    let api = FakeStorage::new()
        .bucket("bucket", &["dir", "dir/a.txt", "dir.txt", "dir2/b.txt"])
        .into_api();

    assert_eq!(expand(api.clone(), "gs://bucket/dir/").await, ["gs://bucket/dir/"]);
    assert_eq!(
        expand(api, "gs://bucket/dir*/").await,
        ["gs://bucket/dir/", "gs://bucket/dir2/"]
    );
}

#[tokio::test]
async fn trailing_delimiter_includes_marker_object() {
    let api = FakeStorage::new()
        .bucket("bucket", &["dir/", "dir/a.txt"])
        .into_api();

    // Both the `dir/` marker object and the prefix of the same name
    let matched = get_wildcard_iterator("gs://bucket/dir/", api, Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(matched.len(), 2);
    assert!(matches!(&matched[0], Resource::Object(o) if o.name() == "dir/"));
    assert!(matches!(&matched[1], Resource::Prefix(p) if p.prefix == "dir/"));
}

#[tokio::test]
async fn generations() {
    let api = bucket()
        .new_generation("bucket", "a.txt", 2)
        .new_generation("bucket", "a.txt", 3)
        .into_api();

    // Only the live version without a generation
    let matched = get_wildcard_iterator("gs://bucket/a*", api.clone(), Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].generation(), Some("3"));

    let matched = get_wildcard_iterator("gs://bucket/a*#2", api.clone(), Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].generation(), Some("2"));

    // A specific generation without wildcards is a direct GET
    let matched = get_wildcard_iterator("gs://bucket/a.txt#1", api.clone(), Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert_eq!(matched[0].generation(), Some("1"));

    let matched = get_wildcard_iterator("gs://bucket/a.txt", api, all_versions())
        .unwrap()
        .collect()
        .await
        .unwrap();
    let generations: Vec<_> = matched.iter().filter_map(Resource::generation).collect();
    assert_eq!(generations, ["1", "2", "3"]);
}

#[tokio::test]
async fn bucket_wildcards() {
    let api = FakeStorage::new()
        .bucket("logs-a", &["one.log", "two.txt"])
        .bucket("logs-b", &["three.log"])
        .bucket("other", &["four.log"])
        .into_api();

    assert_eq!(
        expand(api.clone(), "gs://logs-*").await,
        ["gs://logs-a/", "gs://logs-b/"]
    );
    assert_eq!(
        expand(api.clone(), "gs://logs-?/*.log").await,
        ["gs://logs-a/one.log", "gs://logs-b/three.log"]
    );
    assert_eq!(
        expand(api, "gs://").await,
        ["gs://logs-a/", "gs://logs-b/", "gs://other/"]
    );
}

#[tokio::test]
async fn bucket_urls() {
    let api = FakeStorage::new().bucket("bucket", &["a.txt"]).into_api();

    // Without metadata the bucket isn't checked
    let matched = get_wildcard_iterator("gs://missing", api.clone(), Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(matches!(&matched[0], Resource::Unknown(u) if u.bucket_name() == "missing"));
    assert!(api.calls().is_empty());

    let opts = WildcardOptions {
        cloud: CloudIteratorOptions {
            get_bucket_metadata: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let matched = get_wildcard_iterator("gs://bucket", api.clone(), opts)
        .unwrap()
        .collect()
        .await
        .unwrap();
    assert!(matches!(&matched[0], Resource::Bucket(b) if b.name() == "bucket"));

    let err = get_wildcard_iterator("gs://missing", api, opts)
        .unwrap()
        .collect()
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn wildcard_folder_names_are_an_error() {
    let api = FakeStorage::new()
        .bucket("bucket", &["a*b/c.txt", "ab/c.txt"])
        .into_api();

    let mut iter = get_wildcard_iterator("gs://bucket/a*/c.txt", api, Default::default()).unwrap();

    // Matches in valid folders are still yielded before the error
    let first = iter.next().await.unwrap().unwrap();
    assert_eq!(first.to_string(), "gs://bucket/ab/c.txt#1");

    let err = iter.next().await.unwrap_err();
    assert!(matches!(err, Error::InvalidUrl(_)), "{err}");
    assert!(err.to_string().contains("wildcards are not supported"));

    assert!(iter.next().await.unwrap().is_none());
}

#[tokio::test]
async fn missing_bucket_errors() {
    let api = FakeStorage::new().into_api();

    let err = get_wildcard_iterator("gs://missing/*.txt", api, Default::default())
        .unwrap()
        .collect()
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn streams_results() {
    let api = bucket().into_api();

    let stream = get_wildcard_iterator("gs://bucket/dir2/*", api, Default::default())
        .unwrap()
        .into_stream();
    let matched: Vec<Resource> = stream.try_collect().await.unwrap();

    assert_eq!(
        urls(&matched),
        ["gs://bucket/dir2/a.txt", "gs://bucket/dir2/b.txt"]
    );
}

#[test]
fn invalid_urls() {
    let api: Arc<dyn StorageApi> = bucket().into_api();

    assert!(get_wildcard_iterator("s3://bucket/a", api.clone(), Default::default()).is_err());
    assert!(get_wildcard_iterator("gs:///a", api.clone(), Default::default()).is_err());
    assert!(get_wildcard_iterator("gs://bucket/..", api, Default::default()).is_err());
}
