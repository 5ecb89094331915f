//! The `gsglob` subcommands

pub mod cat;
pub mod cp;
pub mod ls;
pub mod mb;
pub mod rb;
pub mod rm;

use crate::{
    api::StorageApi,
    config::Settings,
    gcs::GcsClient,
    resource::Resource,
    storage::StorageClient,
    wildcard::{self, WildcardOptions},
};
use std::sync::Arc;

const READ_ONLY: &[&str] = &["https://www.googleapis.com/auth/devstorage.read_only"];
const FULL_CONTROL: &[&str] = &["https://www.googleapis.com/auth/devstorage.full_control"];

/// Performs Cloud Storage operations on urls which may contain wildcards
#[derive(clap::Subcommand)]
pub enum Args {
    Ls(ls::Args),
    Cat(cat::Args),
    Cp(cp::Args),
    Rm(rm::Args),
    Mb(mb::Args),
    Rb(rb::Args),
}

impl crate::Scopes for Args {
    fn scopes(&self) -> &'static [&'static str] {
        match self {
            Self::Ls(_) | Self::Cat(_) => READ_ONLY,
            Self::Cp(_) | Self::Rm(_) | Self::Mb(_) | Self::Rb(_) => FULL_CONTROL,
        }
    }
}

pub struct Context {
    pub storage: StorageClient,
    pub api: Arc<dyn StorageApi>,
    pub project: Option<String>,
}

impl Context {
    pub fn new(client: reqwest::Client, endpoint: Option<url::Url>, settings: &Settings) -> Self {
        let gcs = GcsClient::new(client, endpoint, settings.project.clone());

        Self {
            storage: StorageClient::new(gcs.clone(), settings.chunk_size),
            api: Arc::new(gcs),
            project: settings.project.clone(),
        }
    }

    /// Expands the url, failing if it matched nothing
    pub async fn expand(&self, url: &str, opts: WildcardOptions) -> anyhow::Result<Vec<Resource>> {
        let matched = wildcard::get_wildcard_iterator(url, self.api.clone(), opts)?
            .collect()
            .await?;

        anyhow::ensure!(!matched.is_empty(), "URL matched no objects: {url}");
        Ok(matched)
    }
}

pub async fn run(args: Args, ctx: &Context) -> anyhow::Result<()> {
    match args {
        Args::Ls(args) => ls::run(args, ctx).await?,
        Args::Cat(args) => cat::run(args, ctx).await?,
        Args::Cp(args) => cp::run(args, ctx).await?,
        Args::Rm(args) => rm::run(args, ctx).await?,
        Args::Mb(args) => mb::run(args, ctx).await?,
        Args::Rb(args) => rb::run(args, ctx).await?,
    }

    Ok(())
}
