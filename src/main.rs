use anyhow::Context as _;
use clap::Parser;
use gsglob::{config::LogFormat, Scopes};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    settings: gsglob::config::Settings,
    #[clap(subcommand)]
    cmd: gsglob::cmd::Args,
}

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gsglob=warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.settings.log_format);

    let endpoint = args.settings.endpoint_url()?;

    let mut hm = reqwest::header::HeaderMap::new();

    // Emulators don't require, or understand, authentication
    if endpoint.is_none() {
        // Get a token for the default credentials on the system
        let auth_token = gsglob::get_bearer_token(args.cmd.scopes()).await?;
        hm.insert(http::header::AUTHORIZATION, auth_token);
    }

    let client = reqwest::Client::builder()
        .default_headers(hm)
        .build()
        .context("failed to build client")?;

    let ctx = gsglob::cmd::Context::new(client, endpoint, &args.settings);

    let res = gsglob::cmd::run(args.cmd, &ctx).await;
    if let Err(err) = &res {
        tracing::error!(error = %err, "command failed");
    }

    res
}
