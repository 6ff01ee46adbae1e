use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

use neynar_score::config::DEFAULT_API_BASE;
use neynar_score::embed::read_embed;
use neynar_score::fetch::http_client;
use neynar_score::og::{fetch_avatar, render_png, FontSource, RenderRequest};
use neynar_score::score::{NeynarClient, ScoreSource};
use neynar_score::{server, Config};

#[derive(Parser, Debug)]
#[clap(name = "neynar-score")]
#[clap(
    about = "Serve and inspect the Neynar Score mini app",
    long_about = None
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Run the HTTP server")]
    Serve(Config),
    #[command(about = "Render a score card to a PNG file")]
    Render {
        #[clap(long, default_value = "0")]
        score: String,
        #[clap(long, help = "Handle printed above the ring")]
        user: Option<String>,
        #[clap(long, help = "Avatar URL")]
        pfp: Option<String>,
        #[clap(long, env = "OG_FONT_URL")]
        font_url: Option<String>,
        #[clap(long, default_value = "card.png")]
        out: PathBuf,
    },
    #[command(about = "Look up the score of a Farcaster id")]
    Score {
        fid: u64,
        #[clap(long, env = "NEYNAR_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        #[clap(long, env = "NEYNAR_API_BASE", default_value = DEFAULT_API_BASE)]
        api_base: Url,
    },
    #[command(about = "Print the embed metadata a page publishes")]
    Preview { url: Url },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so its values reach the env-backed arguments
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(config) => server::serve(config).await?,
        Command::Render {
            score,
            user,
            pfp,
            font_url,
            out,
        } => {
            let request = RenderRequest::from_query(
                Some(&score),
                user.as_deref(),
                pfp.as_deref(),
            );
            let client = http_client()?;
            // the operator picked this url, any host is fine
            let avatar = match &request.avatar_url {
                Some(url) => fetch_avatar(&client, url, true).await,
                None => None,
            };
            let typeface = FontSource::new(client, font_url).typeface().await;
            let png = render_png(&request, avatar.as_ref(), &typeface)?;
            fs::write(&out, &png)?;
            println!(
                "Rendered {} ({} tier, {} bytes) to {}",
                request.canonical(),
                request.tier(),
                png.len(),
                out.display()
            );
        }
        Command::Score {
            fid,
            api_key,
            api_base,
        } => {
            let scores = NeynarClient::new(http_client()?, api_base, api_key);
            let result = scores.fetch(fid).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            println!("{} ({})", result.formatted(), result.tier());
        }
        Command::Preview { url } => {
            let html = http_client()?
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            println!("{}", read_embed(&html));
        }
    }
    Ok(())
}
