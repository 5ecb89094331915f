use super::Context;
use crate::{
    resource::Resource,
    url::{rstrip_one_delimiter, StorageUrl},
    wildcard::{CloudIteratorOptions, WildcardOptions},
};
use clap::Parser;
use nu_ansi_term::Color;

/// Lists buckets, objects, and prefixes matching the urls
#[derive(Parser)]
pub struct Args {
    /// Print the size, update time, and generation of objects
    #[arg(short, long)]
    long: bool,
    /// Include noncurrent object versions
    #[arg(short, long)]
    all_versions: bool,
    /// Recursively list the contents of matched prefixes
    #[arg(short, long)]
    recursive: bool,
    /// The urls to list, defaults to every bucket in the project
    #[arg(default_value = "gs://")]
    urls: Vec<String>,
}

fn human_size(size: u64) -> String {
    use number_prefix::NumberPrefix;

    match NumberPrefix::binary(size as f64) {
        NumberPrefix::Standalone(b) => format!("{b} B"),
        NumberPrefix::Prefixed(p, n) => format!("{n:.1} {p}B"),
    }
}

fn print_resource(res: &Resource, args: &Args) {
    match res {
        Resource::Bucket(_) | Resource::Unknown(_) => {
            println!("{}", Color::Cyan.paint(res.to_string()));
        }
        Resource::Prefix(_) | Resource::FileDirectory(_) => {
            println!("{}", Color::Blue.paint(res.to_string()));
        }
        Resource::Object(obj) => {
            // The long format always includes the generation
            let url = if args.all_versions || args.long {
                obj.url.url_string()
            } else {
                obj.url.versionless_url_string()
            };

            if args.long {
                let updated = obj
                    .updated
                    .and_then(|t| {
                        t.format(&time::format_description::well_known::Rfc3339)
                            .ok()
                    })
                    .unwrap_or_default();

                println!(
                    "{:>12}  {updated:<25}  {url}",
                    human_size(obj.size.unwrap_or_default())
                );
            } else {
                println!("{url}");
            }
        }
        Resource::FileObject(_) => println!("{res}"),
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let opts = WildcardOptions {
        cloud: CloudIteratorOptions {
            all_versions: args.all_versions,
            ..Default::default()
        },
        ignore_symlinks: false,
    };

    for url in &args.urls {
        let StorageUrl::Cloud(cloud) = StorageUrl::parse(url)? else {
            anyhow::bail!("ls only supports gs:// urls, got '{url}'");
        };

        // A project without buckets is not an error
        let matched = if cloud.is_provider() {
            crate::wildcard::get_wildcard_iterator(url, ctx.api.clone(), opts)?
                .collect()
                .await?
        } else {
            ctx.expand(url, opts).await?
        };

        // Bucket urls list the contents of the bucket rather than the bucket
        let list_contents = cloud.is_bucket();

        for res in matched {
            match &res {
                Resource::Bucket(b) if list_contents => {
                    list_children(ctx, &format!("gs://{}/", b.name()), &args, opts).await?;
                }
                Resource::Unknown(u) if list_contents => {
                    list_children(ctx, &u.versionless_url_string(), &args, opts).await?;
                }
                Resource::Prefix(p) if args.recursive => {
                    println!("{}:", Color::Blue.paint(p.url.to_string()));
                    list_children(ctx, &p.url.versionless_url_string(), &args, opts).await?;
                }
                _ => print_resource(&res, &args),
            }
        }
    }

    Ok(())
}

async fn list_children(
    ctx: &Context,
    container: &str,
    args: &Args,
    opts: WildcardOptions,
) -> anyhow::Result<()> {
    let glob = if args.recursive { "**" } else { "*" };
    let url = format!("{}/{glob}", rstrip_one_delimiter(container));

    let children = crate::wildcard::get_wildcard_iterator(&url, ctx.api.clone(), opts)?
        .collect()
        .await?;

    for child in &children {
        print_resource(child, args);
    }

    Ok(())
}
