//! ScrapeKit CLI - Command-line interface for scraping web content

mod mcp;

use clap::{Args, Parser, Subcommand};
use scrapekit::{BatchOptions, OutputFormat, ScrapeOptions, Tool, TOOL_LLMTXT};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ScrapeKit - adaptive web scraping with browser fallback
#[derive(Parser, Debug)]
#[command(name = "scrapekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Print full help with examples (llmtxt)
    #[arg(long)]
    llmtxt: bool,

    /// User-Agent for plain HTTP requests
    #[arg(long, global = true)]
    user_agent: Option<String>,

    /// Never launch a browser
    #[arg(long, global = true)]
    no_browser: bool,

    /// Chrome/Chromium executable (also read from SCRAPEKIT_CHROME_PATH)
    #[arg(long, global = true)]
    chrome_path: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as MCP (Model Context Protocol) server over stdio
    Mcp,
    /// Scrape a single URL
    Scrape {
        /// URL to scrape (http(s), data: or file:)
        url: String,

        #[command(flatten)]
        options: ScrapeArgs,
    },
    /// Scrape several URLs concurrently and print a JSON report
    Batch {
        /// URLs to scrape
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        options: ScrapeArgs,
    },
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Output format: markdown, text, html or json
    #[arg(long, short, default_value = "markdown", value_parser = parse_format)]
    format: OutputFormat,

    /// Always render in the browser
    #[arg(long)]
    force_render: bool,

    /// Rule set applied after extraction
    #[arg(long)]
    rule_set: Option<String>,

    /// CSS selector to wait for after navigation
    #[arg(long)]
    wait_selector: Option<String>,

    /// Timeout per retrieval attempt in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Request header as "Name: value" (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Capture a full-page screenshot (browser only, included in JSON output)
    #[arg(long)]
    screenshot: bool,
}

impl ScrapeArgs {
    fn batch_options(self) -> BatchOptions {
        let mut scrape = ScrapeOptions::new();
        scrape.force_render = self.force_render;
        scrape.headers = self.headers.into_iter().collect();
        scrape.timeout_ms = self.timeout_ms;
        scrape.wait_selector = self.wait_selector;
        scrape.screenshot = self.screenshot;

        BatchOptions {
            scrape,
            rule_set: self.rule_set,
            format: self.format,
        }
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    s.parse().map_err(|e: scrapekit::ScrapeError| e.to_string())
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got \"{s}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing header name in \"{s}\""));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Handle --llmtxt flag
    if cli.llmtxt {
        std::process::exit(output_status(writeln_safe(TOOL_LLMTXT), 0));
    }

    let tool = build_tool(&cli);

    let code = match cli.command {
        Some(Commands::Mcp) => {
            mcp::run_server(&tool).await;
            0
        }
        Some(Commands::Scrape { url, options }) => {
            match tool.scrape(&url, &options.batch_options()).await {
                Ok(content) => output_status(writeln_safe(&content), 0),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
        Some(Commands::Batch { urls, options }) => {
            let items = tool.batch(&urls, &options.batch_options()).await;
            let code = if items.iter().all(|item| item.success) {
                0
            } else {
                1
            };
            match serde_json::to_string_pretty(&items) {
                Ok(json) => output_status(writeln_safe(&json), code),
                Err(e) => {
                    eprintln!("Error serializing results: {}", e);
                    1
                }
            }
        }
        None => {
            eprintln!("Usage: scrapekit scrape <URL>");
            eprintln!("   or: scrapekit batch <URL>...");
            eprintln!("   or: scrapekit mcp");
            eprintln!("   or: scrapekit --help");
            1
        }
    };

    tool.shutdown().await;
    std::process::exit(code);
}

fn build_tool(cli: &Cli) -> Tool {
    let mut builder = Tool::builder();
    if let Some(ua) = &cli.user_agent {
        builder = builder.user_agent(ua);
    }
    if let Some(path) = &cli.chrome_path {
        builder = builder.chrome_executable(path);
    }
    if cli.no_browser {
        builder = builder.disable_browser();
    }
    builder.build()
}

/// Write a line to stdout
///
/// Errors go back to the caller, which exits only after shutdown.
fn writeln_safe(s: &str) -> io::Result<()> {
    write_line(&mut io::stdout().lock(), s)
}

fn write_line(out: &mut impl Write, s: &str) -> io::Result<()> {
    writeln!(out, "{}", s)?;
    out.flush()
}

/// Exit code after writing output; a closed pipe is not an error
fn output_status(written: io::Result<()>, code: i32) -> i32 {
    match written {
        Ok(()) => code,
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => 0,
        Err(e) => {
            eprintln!("Error writing to stdout: {}", e);
            1
        }
    }
}
