//! Command-line interface.
//!
//! `serve` runs the HTTP API and is what happens when no subcommand is given.
//! `fetch` scrapes one category, prints the ranked listing and saves it as JSON.
//!
//! ```sh
//! gnews-thumbs serve --port 8080
//! gnews-thumbs fetch --country IN --category sports --limit 10 --output-dir ./out
//! GNEWS_CONFIG=/etc/gnews.toml gnews-thumbs
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;
use crate::feed::{category_names, topic_code};
use crate::pipeline::{write_report, Article, NewsService};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GNEWS_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Scrape one category and write a JSON report
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct ServeArgs {
    /// Overrides `server.host`
    #[arg(long)]
    pub host: Option<String>,

    /// Overrides `server.port`
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug, PartialEq, Eq)]
pub struct FetchArgs {
    #[arg(long, default_value = "US")]
    pub country: String,

    #[arg(long, default_value = "top", value_parser = parse_category)]
    pub category: String,

    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Directory the JSON report is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

impl Cli {
    /// The subcommand to run, `serve` with config values when none was given.
    pub fn command(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    }
}

fn parse_category(value: &str) -> Result<String, String> {
    let category = value.to_lowercase();
    if topic_code(&category).is_some() {
        Ok(category)
    } else {
        Err(format!(
            "unknown category, expected one of: {}",
            category_names().join(", ")
        ))
    }
}

pub fn render_listing(articles: &[Article]) -> String {
    let mut out = String::from("\n--- NEWS ---\n\n");

    for article in articles {
        let _ = writeln!(out, "{}. {}", article.rank, article.title);
        let _ = writeln!(out, "   {} | {}", article.source, article.published);
        let _ = writeln!(out, "   {}", article.link.as_deref().unwrap_or("N/A"));
        let _ = writeln!(
            out,
            "   Thumbnail: {}\n",
            article.thumbnail.as_deref().unwrap_or("none")
        );
    }

    out
}

pub async fn run_fetch(news: &NewsService, args: &FetchArgs) -> anyhow::Result<PathBuf> {
    let country = args.country.to_uppercase();
    let articles = news.scrape(&country, &args.category, args.limit).await?;

    println!(
        "Fetched {} {} articles for {} at {}",
        articles.len(),
        args.category,
        country,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    print!("{}", render_listing(&articles));

    let path = write_report(Path::new(&args.output_dir), &country, &args.category, &articles).await?;
    println!("Saved to {}", path.display());

    Ok(path)
}
