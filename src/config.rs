use crate::index::BinningStrategy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BinningKind {
    /// Nested power-of-two bins, as in BAI/CSI indices
    Hierarchical,
    /// Equal-width bins
    Fixed,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "htsnexus")]
#[command(about = "htsget-style genomic range resolution server")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "HTSNEXUS_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "HTSNEXUS_PORT", default_value = "48444")]
    pub port: u16,

    /// Base URL for ticket URLs (e.g., https://example.com)
    #[arg(long, env = "HTSNEXUS_BASE_URL")]
    pub base_url: Option<String>,

    /// SQLite index database written by the htsnexus indexers
    #[arg(long, env = "HTSNEXUS_INDEX_DB", default_value = "htsnexus_index")]
    pub index_db: PathBuf,

    /// Directory relative local file paths resolve against
    #[arg(long, env = "HTSNEXUS_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Namespace for routes that name only an accession
    #[arg(long, env = "HTSNEXUS_DEFAULT_NAMESPACE", default_value = "default")]
    pub default_namespace: String,

    /// JSON file with S3 credentials (access_key_id, secret_access_key, ...)
    #[arg(long, env = "HTSNEXUS_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Lifetime of presigned S3 URLs, in seconds
    #[arg(long, env = "HTSNEXUS_PRESIGN_EXPIRY_SECS", default_value = "3600")]
    pub presign_expiry_secs: u64,

    /// Bound on index loads and URL signing, in milliseconds
    #[arg(long, env = "HTSNEXUS_LOOKUP_TIMEOUT_MS", default_value = "5000")]
    pub lookup_timeout_ms: u64,

    /// Maximum number of cached accessions (unbounded if unset)
    #[arg(long, env = "HTSNEXUS_CACHE_CAPACITY")]
    pub cache_capacity: Option<u64>,

    /// Coordinate binning used by the block index
    #[arg(long, env = "HTSNEXUS_BINNING", value_enum, default_value = "hierarchical")]
    pub binning: BinningKind,

    /// Bin width for --binning fixed
    #[arg(long, env = "HTSNEXUS_FIXED_BIN_WIDTH", default_value = "16384")]
    pub fixed_bin_width: u64,

    /// Enable CORS for all origins
    #[arg(long, env = "HTSNEXUS_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Maximum bytes served by the data endpoint per response
    #[arg(long, env = "HTSNEXUS_MAX_PAYLOAD", default_value = "104857600")]
    pub max_payload: u64,
}

impl Config {
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port))
    }

    pub fn binning_strategy(&self) -> BinningStrategy {
        match self.binning {
            BinningKind::Hierarchical => BinningStrategy::Hierarchical,
            BinningKind::Fixed => BinningStrategy::Fixed {
                width: self.fixed_bin_width,
            },
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.presign_expiry_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("htsnexus").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_effective_base_url_default() {
        let config = config(&["--host", "0.0.0.0"]);
        assert_eq!(config.effective_base_url(), "http://0.0.0.0:48444");
    }

    #[test]
    fn test_effective_base_url_custom() {
        let config = config(&["--base-url", "https://example.com/htsget"]);
        assert_eq!(config.effective_base_url(), "https://example.com/htsget");
    }

    #[test]
    fn test_effective_base_url_custom_port() {
        let config = config(&["--host", "localhost", "--port", "3000"]);
        assert_eq!(config.effective_base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_binning_strategy() {
        let config = config(&["--binning", "fixed", "--fixed-bin-width", "1000"]);
        assert_eq!(
            config.binning_strategy(),
            BinningStrategy::Fixed { width: 1000 }
        );
        assert_eq!(
            self::config(&[]).binning_strategy(),
            BinningStrategy::Hierarchical
        );
    }

    #[test]
    fn test_durations() {
        let config = config(&["--lookup-timeout-ms", "250", "--presign-expiry-secs", "60"]);
        assert_eq!(config.lookup_timeout(), Duration::from_millis(250));
        assert_eq!(config.presign_expiry(), Duration::from_secs(60));
        assert!(config.cache_capacity.is_none());
    }
}
