use std::path::PathBuf;

use crate::error::Result;
pub use clap::Parser;
use url::Url;

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 3000,
        env = "MFD_LISTEN_PORT",
        help = "Port to listen on"
    )]
    pub port: u16,

    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "MFD_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "MFD_BASE_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of the server, as visible to users"
    )]
    pub base_url: Url,

    #[arg(
        long,
        env = "MFD_DATABASE_URL",
        help = "Database URL e.g. sqlite://file.db, default is sqlite://[data-dir]/mfd.db"
    )]
    database_url: Option<String>,

    #[arg(
        long,
        env = "MFD_DATA_DIR",
        default_value = "mfd-data",
        help = "Data directory (database, media files)"
    )]
    data_dir: String,

    #[arg(
        long,
        env = "MFD_MEDIA_DIR",
        help = "Directory for uploaded media, default is [data-dir]/media"
    )]
    media_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "MFD_UPLOAD_LIMIT_MB",
        default_value = "100",
        help = "Maximum upload size in MB"
    )]
    pub upload_limit_mb: usize,

    #[arg(
        long,
        env = "MFD_ADMIN_PASSWORD",
        help = "Password for the initial admin account, used only when no users exist yet"
    )]
    pub admin_password: Option<String>,

    #[arg(
        long,
        env = "MFD_DEV",
        help = "Development mode - exposes error page test routes and raw media passthrough"
    )]
    pub dev: bool,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("media"))
    }

    pub fn database_url(&self) -> String {
        self.database_url
            .clone()
            .unwrap_or_else(|| format!("sqlite://{}/mfd.db", self.data_dir))
    }
}
