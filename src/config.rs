//! Process configuration: CLI flags with environment fallbacks, validated
//! into a `Config` before anything touches the network.

use crate::error::{GatewayError, Result};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct Args {
    /// Base URL of the remote archive API
    #[arg(long, env = "GATEFS_REMOTE_URL", default_value = "http://127.0.0.1:8080")]
    pub remote_url: String,

    /// Upload destination bucket
    #[arg(long, env = "GATEFS_UPLOAD_BUCKET", default_value = "")]
    pub bucket: String,

    /// Key prefix for uploaded objects
    #[arg(long, env = "GATEFS_UPLOAD_PREFIX", default_value = "uploads")]
    pub key_prefix: String,

    /// Directory for local spool buffers
    #[arg(long, env = "GATEFS_SPOOL_DIR")]
    pub spool_dir: Option<PathBuf>,

    /// Custom S3 endpoint (MinIO and friends)
    #[arg(long, env = "GATEFS_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// S3 region
    #[arg(long, env = "GATEFS_S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub remote_url: String,
    pub bucket: String,
    pub key_prefix: String,
    pub spool_dir: PathBuf,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
}

impl Config {
    /// Fails fast when the upload destination is not configured.
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.bucket.is_empty() {
            return Err(GatewayError::SystemConfiguration("GATEFS_UPLOAD_BUCKET"));
        }
        let spool_dir = match &args.spool_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .ok_or(GatewayError::SystemConfiguration("GATEFS_SPOOL_DIR"))?
                .join("gatefs")
                .join("spool"),
        };
        Ok(Self {
            remote_url: args.remote_url.clone(),
            bucket: args.bucket.clone(),
            key_prefix: args.key_prefix.clone(),
            spool_dir,
            s3_endpoint: args.s3_endpoint.clone(),
            s3_region: args.s3_region.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Args {
        Args {
            remote_url: "http://api".into(),
            bucket: String::new(),
            key_prefix: "uploads".into(),
            spool_dir: Some(PathBuf::from("/tmp/spool")),
            s3_endpoint: None,
            s3_region: "us-east-1".into(),
        }
    }

    #[test]
    fn missing_bucket_fails_fast() {
        assert!(matches!(
            Config::from_args(&args()),
            Err(GatewayError::SystemConfiguration("GATEFS_UPLOAD_BUCKET"))
        ));
    }

    #[test]
    fn configured_bucket_passes() {
        let config = Config::from_args(&Args {
            bucket: "b".into(),
            ..args()
        })
        .unwrap();
        assert_eq!(config.bucket, "b");
        assert_eq!(config.spool_dir, PathBuf::from("/tmp/spool"));
    }
}
