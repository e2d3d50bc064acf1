//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const UPLOAD_FIELD: &str = "File";
pub const COPY_DESTINATION_HEADER: &str = "x-copy-from";
pub const SERVER_ID_HEADER: &str = "file-server";
pub const SNIFF_LEN: usize = 512;
pub const DEFAULT_SERVER_NAME: &str = "shine";
pub const SHUTDOWN_GRACE_SECS: u64 = 10;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "ota-file-server", version = VERSION_INFO, about = "OTA file server")]
pub struct Args {
    #[arg(
        short = 'r',
        long,
        env = "OTA_ROOT_DIR",
        default_value = "./serve_path",
        help = "Root directory exposed over HTTP"
    )]
    pub root_dir: String,
    #[arg(
        short = 'b',
        long,
        env = "OTA_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "OTA_PORT",
        default_value_t = 1323,
        help = "HTTP port"
    )]
    pub port: u16,
    #[arg(long, env = "OTA_CORS_ORIGINS", help = "Comma separated CORS origins")]
    pub cors_origins: Option<String>,
    #[arg(
        long,
        env = "OTA_SERVER_NAME",
        default_value = DEFAULT_SERVER_NAME,
        help = "Value of the server identification header sent on HEAD"
    )]
    pub server_name: String,
}
