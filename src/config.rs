use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use url::Url;

use crate::Result;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
pub const DEFAULT_API_BASE: &str = "https://api.neynar.com";
pub const DEFAULT_RENDER_CACHE_BYTES: usize = 32 * 1024 * 1024;

/// Server settings. Every option can also come from the environment
/// (or a `.env` file loaded by the binary).
#[derive(Clone, Debug, clap::Args)]
pub struct Config {
    #[clap(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    #[clap(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,
    #[clap(
        long = "public-url",
        env = "NEXT_PUBLIC_URL",
        default_value = DEFAULT_PUBLIC_URL,
        help = "Public base URL used in share links and embeds"
    )]
    pub public_url: Url,
    #[clap(long, env = "NEYNAR_API_KEY", hide_env_values = true)]
    pub neynar_api_key: Option<String>,
    #[clap(long, env = "NEYNAR_API_BASE", default_value = DEFAULT_API_BASE)]
    pub neynar_api_base: Url,
    #[clap(
        long,
        env = "OG_FONT_URL",
        help = "TTF/OTF font used on preview cards"
    )]
    pub og_font_url: Option<String>,
    #[clap(
        long,
        env = "OG_ALLOW_PRIVATE_AVATARS",
        help = "Fetch avatars from loopback and private networks too"
    )]
    pub allow_private_avatars: bool,
    #[clap(long, env = "PUBLIC_DIR", default_value = "public")]
    pub public_dir: PathBuf,
    #[clap(
        long,
        env = "RENDER_CACHE_BYTES",
        default_value_t = DEFAULT_RENDER_CACHE_BYTES,
        help = "Byte budget of the rendered image cache, 0 disables it"
    )]
    pub render_cache_bytes: usize,
}

impl Config {
    /// Defaults for everything but the public URL.
    pub fn new(public_url: Url) -> Result<Self> {
        Ok(Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            public_url,
            neynar_api_key: None,
            neynar_api_base: Url::parse(DEFAULT_API_BASE)?,
            og_font_url: None,
            allow_private_avatars: false,
            public_dir: PathBuf::from("public"),
            render_cache_bytes: DEFAULT_RENDER_CACHE_BYTES,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
