use super::Context;
use crate::{
    resource::Resource,
    url::StorageUrl,
    wildcard::{CloudIteratorOptions, WildcardOptions},
};
use clap::Parser;
use nu_ansi_term::Color;

/// Deletes empty buckets
#[derive(Parser)]
pub struct Args {
    /// Bucket urls, which may contain wildcards
    #[arg(required = true)]
    urls: Vec<String>,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let opts = WildcardOptions {
        cloud: CloudIteratorOptions {
            get_bucket_metadata: true,
            ..Default::default()
        },
        ..Default::default()
    };

    for url in &args.urls {
        match StorageUrl::parse(url)? {
            StorageUrl::Cloud(c) if c.is_bucket() => {}
            _ => anyhow::bail!("'{url}' is not a bucket url"),
        }

        for res in ctx.expand(url, opts).await? {
            let Resource::Bucket(bucket) = res else {
                continue;
            };

            ctx.storage.delete_bucket(bucket.name()).await?;
            println!("{} {}", Color::Red.paint("removed"), bucket.url);
        }
    }

    Ok(())
}
