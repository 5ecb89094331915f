use super::Context;
use crate::{
    resource::Resource,
    url::rstrip_one_delimiter,
    wildcard::{CloudIteratorOptions, WildcardOptions},
};
use clap::Parser;
use nu_ansi_term::Color;

/// Deletes objects, and with --recursive, prefixes and buckets
#[derive(Parser)]
pub struct Args {
    /// Delete the contents of matched prefixes and buckets, then the buckets
    /// themselves
    #[arg(short, long)]
    recursive: bool,
    /// Delete every version of matched objects, not just the live one
    #[arg(short, long)]
    all_versions: bool,
    /// Urls, which may contain wildcards
    #[arg(required = true)]
    urls: Vec<String>,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let opts = WildcardOptions {
        cloud: CloudIteratorOptions {
            all_versions: args.all_versions,
            ..Default::default()
        },
        ..Default::default()
    };

    for url in &args.urls {
        anyhow::ensure!(
            crate::url::StorageUrl::parse(url)?.is_cloud(),
            "rm only supports gs:// urls, got '{url}'"
        );

        for res in ctx.expand(url, opts).await? {
            match &res {
                Resource::Object(obj) => delete(ctx, &obj.url).await?,
                Resource::Prefix(_) | Resource::Bucket(_) | Resource::Unknown(_) => {
                    anyhow::ensure!(
                        args.recursive,
                        "{res} is a container, use --recursive to delete it and its contents"
                    );

                    let Some(container) = res.cloud_url() else {
                        continue;
                    };

                    let contents = format!(
                        "{}/**",
                        rstrip_one_delimiter(&container.versionless_url_string())
                    );
                    let children =
                        crate::wildcard::get_wildcard_iterator(&contents, ctx.api.clone(), opts)?
                            .collect()
                            .await?;

                    for child in children {
                        if let Resource::Object(obj) = child {
                            delete(ctx, &obj.url).await?;
                        }
                    }

                    if container.is_bucket() {
                        ctx.storage.delete_bucket(container.bucket_name()).await?;
                        println!("{} {container}", Color::Red.paint("removed"));
                    }
                }
                Resource::FileObject(_) | Resource::FileDirectory(_) => {}
            }
        }
    }

    Ok(())
}

async fn delete(ctx: &Context, obj: &crate::url::CloudUrl) -> anyhow::Result<()> {
    ctx.storage.delete_object(obj).await?;
    println!("{} {obj}", Color::Red.paint("removed"));
    Ok(())
}
