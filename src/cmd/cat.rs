use super::Context;
use crate::{resource::Resource, wildcard::WildcardOptions};
use clap::Parser;
use tokio::io::AsyncWriteExt;

/// Writes the contents of every matching object to stdout
#[derive(Parser)]
pub struct Args {
    /// Object urls, which may contain wildcards
    #[arg(required = true)]
    urls: Vec<String>,
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();

    for url in &args.urls {
        for res in ctx.expand(url, WildcardOptions::default()).await? {
            let Resource::Object(obj) = &res else {
                tracing::debug!(%res, "skipping non-object");
                continue;
            };

            let contents = ctx.storage.read_object(&obj.url).await?;
            stdout.write_all(&contents).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}
