//! Shop Ledger CLI: entry point.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use shop_ledger::{
    parse_price_text, read_amount, reconcile_total_within, HtmlPage, ProductName, SiteProfile,
};
use shop_ledger_e2e::driver::{ChromiumDriver, PageDriver};
use shop_ledger_e2e::{load_profile, Journey, JourneyReport};

#[derive(Parser)]
#[command(
    name = "shop-ledger",
    about = "Storefront price checks: locate prices, reconcile totals, run the shopping journey",
    version
)]
struct Cli {
    /// Path to a site profile JSON file.
    /// Also reads from SHOP_LEDGER_PROFILE env var.
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse displayed price text into minor units.
    Parse {
        /// Price text, e.g. "€ 12,50".
        text: String,
    },

    /// Locate a product's price in a saved HTML page.
    Locate {
        /// HTML file to search.
        #[arg(long)]
        html: PathBuf,

        /// Product title to look for.
        #[arg(long)]
        product: String,

        /// Print the quote as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Read the amount shown by a selector in a saved HTML page.
    Amount {
        /// HTML file to read.
        #[arg(long)]
        html: PathBuf,

        /// CSS selector of the amount element.
        #[arg(long)]
        selector: String,
    },

    /// Check a displayed checkout total.
    Reconcile {
        /// Subtotal before discount.
        #[arg(long)]
        subtotal: String,

        /// Shipping price.
        #[arg(long)]
        shipping: String,

        /// Discount percentage (0-100).
        #[arg(long, default_value_t = 0)]
        discount: u32,

        /// Total shown on the page.
        #[arg(long)]
        displayed: String,
    },

    /// Run the full shopping journey in Chromium.
    Journey {
        /// Override the profile's base URL.
        #[arg(long)]
        base_url: Option<String>,

        /// Append step results to a JSONL report.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Show the browser window.
        #[arg(long)]
        headful: bool,
    },

    /// Print the effective site profile as JSON.
    Profile,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   shop-ledger completions bash > ~/.local/share/bash-completion/completions/shop-ledger
    ///   shop-ledger completions zsh > ~/.zfunc/_shop-ledger
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Parse { text } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let amount = parse_price_text(&text, &profile.currency_symbol)?;
            println!("{} ({} minor units)", amount, amount.minor());
        }

        Commands::Locate {
            html,
            product,
            json,
        } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let source = read_html(&html)?;
            let page = HtmlPage::parse(&source);
            let quote = profile
                .price_locator()
                .locate(&ProductName::new(product), &page)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&quote)?);
            } else {
                println!(
                    "{}: {}{} (via {})",
                    quote.product, profile.currency_symbol, quote.amount, quote.source
                );
            }
        }

        Commands::Amount { html, selector } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let source = read_html(&html)?;
            let page = HtmlPage::parse(&source);
            let amount = read_amount(&page, &selector, &profile.currency_symbol)?;
            println!("{}{}", profile.currency_symbol, amount);
        }

        Commands::Reconcile {
            subtotal,
            shipping,
            discount,
            displayed,
        } => {
            let profile = load_profile(cli.profile.as_deref())?;
            let symbol = &profile.currency_symbol;
            let result = reconcile_total_within(
                parse_price_text(&subtotal, symbol).context("invalid --subtotal")?,
                parse_price_text(&shipping, symbol).context("invalid --shipping")?,
                discount,
                parse_price_text(&displayed, symbol).context("invalid --displayed")?,
                profile.tolerance(),
            )?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Journey {
            base_url,
            report,
            headful,
        } => {
            let profile = load_profile(cli.profile.as_deref())?;
            run_journey(profile, base_url, report, headful).await?;
        }

        Commands::Profile => {
            let profile = load_profile(cli.profile.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "shop-ledger", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn run_journey(
    profile: SiteProfile,
    base_url: Option<String>,
    report: Option<PathBuf>,
    headful: bool,
) -> Result<()> {
    let report = match report {
        Some(path) => JourneyReport::open(&path)?,
        None => JourneyReport::in_memory(),
    };
    let navigation_timeout = profile.timeouts.default_wait();
    let mut journey = Journey::new(profile).with_report(report);
    if let Some(url) = base_url {
        journey = journey.with_base_url(url);
    }

    let mut driver = ChromiumDriver::launch(headful, navigation_timeout).await?;
    let outcome = journey.run(&mut driver as &mut dyn PageDriver).await;
    if let Err(e) = driver.close().await {
        tracing::warn!("failed to close Chromium: {e:#}");
    }

    for step in journey.report().steps() {
        println!("{:?}  {:>6}ms  {}", step.status, step.duration_ms, step.step);
    }
    let reconciliation = outcome?;
    println!(
        "Total verified: {} - {} + {} = {} (page shows {})",
        reconciliation.subtotal,
        reconciliation.discount,
        reconciliation.shipping,
        reconciliation.calculated,
        reconciliation.displayed
    );
    Ok(())
}

fn read_html(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
