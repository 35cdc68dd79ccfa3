use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use mrss::config::TransportConfig;
use mrss::feed::{change_key, FeedParser, Format, HttpTransport};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    /// Pick by extension: `.json` is structured, anything else markup
    Auto,
    Markup,
    Structured,
}

#[derive(Parser, Debug)]
#[command(name = "mrss", about = "Decode an MRSS feed and print its media change keys")]
struct Args {
    /// Local file path or http(s) URL of the feed
    source: String,

    /// Feed encoding
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    format: FormatArg,

    /// Transport config file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TransportConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => TransportConfig::default(),
    };

    let format = match args.format {
        FormatArg::Auto => Format::infer(&args.source),
        FormatArg::Markup => Format::Markup,
        FormatArg::Structured => Format::Structured,
    };

    let transport = HttpTransport::new(&config).context("Failed to build HTTP client")?;
    let parser = FeedParser::new(transport);
    let feed = parser
        .parse(&args.source, format)
        .with_context(|| format!("Failed to parse {} feed: {}", format, args.source))?;

    let channel = &feed.channel;
    println!("{}", channel.title);
    if !channel.description.is_empty() {
        println!("  {}", channel.description);
    }
    println!(
        "{} items, {} media attachments",
        channel.items.len(),
        feed.media_count()
    );

    for (i, item) in channel.items.iter().enumerate() {
        println!();
        println!("[{}] {}", i + 1, item.title);
        if let Some(valid) = &item.valid {
            println!("    valid: {:?}", valid);
        }
        for media in &item.media_contents {
            println!("    {} {}", change_key(media), media.url);
            if let Some(valid) = &media.valid {
                println!("      valid: {:?}", valid);
            }
        }
    }

    Ok(())
}
