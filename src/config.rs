use anyhow::Context as _;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human readable log lines
    #[default]
    Text,
    /// One JSON object per log line
    Json,
}

/// Options shared by every subcommand
#[derive(clap::Args, Clone, Debug)]
pub struct Settings {
    /// Storage endpoint to send requests to instead of Cloud Storage, eg. an
    /// emulator. Authentication is skipped when this is set.
    #[arg(long, global = true, env = "STORAGE_EMULATOR_HOST")]
    pub endpoint: Option<String>,
    /// The project used when listing or creating buckets
    #[arg(long, global = true, env = "CLOUDSDK_CORE_PROJECT")]
    pub project: Option<String>,
    /// Transfer chunk size in bytes, rounded up to a multiple of 256KiB. 0
    /// uses the default of 1MiB, the maximum is 1GiB.
    #[arg(
        long,
        global = true,
        env = "CLOUDSDK_STORAGE_CHUNK_SIZE",
        default_value_t = 0,
        value_parser = clap::value_parser!(u64).range(0..=crate::storage::MAX_CHUNK_SIZE)
    )]
    pub chunk_size: u64,
    /// The format of log output, which is written to stderr and filtered via
    /// RUST_LOG
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Settings {
    /// Parses the endpoint override, emulators are commonly specified as a
    /// bare `host:port` so those default to plain http
    pub fn endpoint_url(&self) -> anyhow::Result<Option<url::Url>> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(None);
        };

        let endpoint = if endpoint.contains("://") {
            endpoint.clone()
        } else {
            format!("http://{endpoint}")
        };

        url::Url::parse(&endpoint)
            .with_context(|| format!("invalid endpoint '{endpoint}'"))
            .map(Some)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn settings(endpoint: Option<&str>) -> Settings {
        Settings {
            endpoint: endpoint.map(String::from),
            project: None,
            chunk_size: 0,
            log_format: LogFormat::Text,
        }
    }

    #[test]
    fn bare_hosts_use_http() {
        let url = settings(Some("localhost:4443")).endpoint_url().unwrap().unwrap();
        assert_eq!(url.as_str(), "http://localhost:4443/");

        let url = settings(Some("https://gcs.example.com"))
            .endpoint_url()
            .unwrap()
            .unwrap();
        assert_eq!(url.scheme(), "https");

        assert!(settings(None).endpoint_url().unwrap().is_none());
    }

    #[derive(clap::Parser)]
    struct Cli {
        #[clap(flatten)]
        settings: Settings,
    }

    #[test]
    fn rejects_oversized_chunks() {
        use clap::Parser;

        let cli = Cli::try_parse_from(["gsglob", "--chunk-size", "262144"]).unwrap();
        assert_eq!(cli.settings.chunk_size, 262144);

        assert!(Cli::try_parse_from(["gsglob", "--chunk-size", "18446744073709551615"]).is_err());
        assert!(Cli::try_parse_from(["gsglob", "--chunk-size", "1073741825"]).is_err());
    }
}
