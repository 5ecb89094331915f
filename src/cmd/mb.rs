use super::Context;
use crate::url::StorageUrl;
use clap::Parser;
use nu_ansi_term::Color;

/// Creates buckets, succeeding if a bucket already exists and is accessible
#[derive(Parser)]
pub struct Args {
    /// Bucket urls, eg. gs://my-bucket
    #[arg(required = true)]
    urls: Vec<String>,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    for url in &args.urls {
        let bucket = match StorageUrl::parse(url)? {
            StorageUrl::Cloud(c) if c.is_bucket() => c,
            _ => anyhow::bail!("'{url}' is not a bucket url"),
        };

        anyhow::ensure!(
            !crate::wildcard::contains_wildcard(bucket.bucket_name()),
            "bucket names may not contain wildcards: {url}"
        );

        ctx.storage
            .create_bucket_if_not_exists(bucket.bucket_name(), ctx.project.as_deref())
            .await?;

        println!("{} {bucket}", Color::Green.paint("created"));
    }

    Ok(())
}
