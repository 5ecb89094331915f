use super::Context;
use crate::{
    resource::Resource,
    url::{rstrip_one_delimiter, CloudUrl, FileUrl, StorageUrl, DELIMITER},
    wildcard::WildcardOptions,
};
use anyhow::Context as _;
use camino::Utf8Path;
use clap::Parser;
use nu_ansi_term::Color;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Copies local files and cloud objects, in any direction
#[derive(Parser)]
pub struct Args {
    /// Copy the contents of directories, prefixes, and buckets
    #[arg(short, long)]
    recursive: bool,
    /// Skip symlinks when expanding local sources
    #[arg(long)]
    ignore_symlinks: bool,
    /// One or more sources followed by the destination. `-` reads from stdin
    /// as a source or writes to stdout as the destination.
    #[arg(required = true, num_args = 2..)]
    urls: Vec<String>,
}

/// A single source to copy, and the name it is given beneath a destination
/// container
#[derive(Debug, PartialEq, Eq)]
struct CopyItem {
    src: StorageUrl,
    name: String,
}

/// The name of `item` relative to the parent of `container`, so that copying
/// `a/dir` recursively recreates `dir/...` in the destination
fn relative_name<'i>(container: &str, item: &'i str) -> &'i str {
    let container = rstrip_one_delimiter(container);
    let parent_len = container.rfind(DELIMITER).map_or(0, |i| i + 1);

    if item.starts_with(container) {
        &item[parent_len..]
    } else {
        item
    }
}

fn base_name(name: &str) -> &str {
    let name = rstrip_one_delimiter(name);
    name.rsplit(DELIMITER).next().unwrap_or(name)
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let Some((dst, sources)) = args.urls.split_last() else {
        anyhow::bail!("a source and destination are required");
    };

    let dst = StorageUrl::parse(dst)?;
    let opts = WildcardOptions {
        ignore_symlinks: args.ignore_symlinks,
        ..Default::default()
    };

    let mut items = Vec::new();
    for src in sources {
        items.extend(gather(ctx, src, args.recursive, opts).await?);
    }

    let into_container = args.recursive
        || items.len() > 1
        || dst.versionless_url_string().ends_with(DELIMITER)
        || match &dst {
            StorageUrl::Cloud(c) => c.is_bucket(),
            StorageUrl::File(f) => f.is_dir(),
        };

    if let StorageUrl::File(f) = &dst {
        anyhow::ensure!(
            !f.is_stream() || !into_container,
            "only a single object can be copied to stdout"
        );
    }

    for item in items {
        let target = if into_container {
            dst.join(&item.name)?
        } else {
            dst.clone()
        };

        copy_one(ctx, &item.src, &target).await?;
        println!("{} {} -> {target}", Color::Green.paint("copied"), item.src);
    }

    Ok(())
}

/// Expands a source url into the individual files and objects to copy
async fn gather(
    ctx: &Context,
    src: &str,
    recursive: bool,
    opts: WildcardOptions,
) -> anyhow::Result<Vec<CopyItem>> {
    let mut items = Vec::new();

    for res in ctx.expand(src, opts).await? {
        match res {
            Resource::Object(obj) => {
                let name = base_name(obj.name()).to_owned();
                items.push(CopyItem {
                    src: StorageUrl::Cloud(obj.url),
                    name,
                });
            }
            Resource::FileObject(file) => {
                let name = if file.is_stream() {
                    "-".to_owned()
                } else {
                    base_name(file.path.as_str()).to_owned()
                };
                items.push(CopyItem {
                    src: StorageUrl::File(file),
                    name,
                });
            }
            res if res.is_container() => {
                if !recursive {
                    tracing::warn!(%res, "omitting container, use --recursive to copy its contents");
                    continue;
                }

                let container = res.object_name().to_owned();
                let contents = match res.url() {
                    crate::resource::ResourceUrl::Cloud(c) => format!(
                        "{}/**",
                        rstrip_one_delimiter(&c.versionless_url_string())
                    ),
                    crate::resource::ResourceUrl::File(f) => {
                        format!("{}/**", rstrip_one_delimiter(f.path.as_str()))
                    }
                };

                let children = crate::wildcard::get_wildcard_iterator(&contents, ctx.api.clone(), opts)?
                    .collect()
                    .await?;

                for child in children {
                    match child {
                        Resource::Object(obj) => {
                            let name = relative_name(&container, obj.name()).to_owned();
                            items.push(CopyItem {
                                src: StorageUrl::Cloud(obj.url),
                                name,
                            });
                        }
                        Resource::FileObject(file) => {
                            let name = relative_name(&container, file.path.as_str()).to_owned();
                            items.push(CopyItem {
                                src: StorageUrl::File(file),
                                name,
                            });
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(items)
}

async fn copy_one(ctx: &Context, src: &StorageUrl, dst: &StorageUrl) -> anyhow::Result<()> {
    match (src, dst) {
        (StorageUrl::File(src), StorageUrl::Cloud(dst)) => upload(ctx, src, dst).await,
        (StorageUrl::Cloud(src), StorageUrl::File(dst)) => download(ctx, src, dst).await,
        (StorageUrl::Cloud(src), StorageUrl::Cloud(dst)) => {
            ctx.storage.rewrite(src, dst).await?;
            Ok(())
        }
        (StorageUrl::File(src), StorageUrl::File(dst)) => {
            create_parent(&dst.path).await?;
            tokio::fs::copy(&src.path, &dst.path)
                .await
                .with_context(|| format!("failed to copy {src} to {dst}"))?;
            Ok(())
        }
    }
}

async fn upload(ctx: &Context, src: &FileUrl, dst: &CloudUrl) -> anyhow::Result<()> {
    anyhow::ensure!(dst.is_object(), "cannot upload to '{dst}', an object name is required");

    if src.is_stream() {
        let mut content = Vec::new();
        tokio::io::stdin().read_to_end(&mut content).await?;

        ctx.storage
            .api()
            .insert_object(
                dst.bucket_name(),
                dst.object_name(),
                content,
                "application/octet-stream",
            )
            .await?;
    } else {
        ctx.storage
            .copy_file_to_gcs(dst.bucket_name(), &src.path, dst.object_name())
            .await?;
    }

    Ok(())
}

async fn download(ctx: &Context, src: &CloudUrl, dst: &FileUrl) -> anyhow::Result<()> {
    if dst.is_stream() {
        let contents = ctx.storage.read_object(src).await?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(&contents).await?;
        stdout.flush().await?;
        return Ok(());
    }

    // Directory markers have no local equivalent
    if src.object_name().ends_with(DELIMITER) {
        tracing::debug!(%src, "skipping directory marker");
        return Ok(());
    }

    create_parent(&dst.path).await?;
    ctx.storage
        .copy_file_from_gcs(
            src.bucket_name(),
            src.object_name(),
            src.generation.as_deref(),
            &dst.path,
        )
        .await?;
    Ok(())
}

async fn create_parent(path: &Utf8Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {parent}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_relative_to_container_parent() {
        assert_eq!(relative_name("a/dir", "a/dir/x/y.txt"), "dir/x/y.txt");
        assert_eq!(relative_name("a/dir/", "a/dir/y.txt"), "dir/y.txt");
        assert_eq!(relative_name("dir", "dir/y.txt"), "dir/y.txt");
        // Buckets have no name of their own
        assert_eq!(relative_name("", "x/y.txt"), "x/y.txt");
    }

    #[test]
    fn base_names() {
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("a/b/"), "b");
        assert_eq!(base_name("c.txt"), "c.txt");
    }
}
