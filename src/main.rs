use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use feedpull::{
    DisabledVideoClient, HookConfig, Hooks, NoopReporter, ProgressEvent, ProgressReporter,
    ReqwestClient, SharedProgressReporter, StaticRegistry, SyncContext, SyncOptions, sync_feeds,
};

// Emoji with fallback for terminals without Unicode support
static SATELLITE: Emoji<'_, '_> = Emoji("📡 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static LIST: Emoji<'_, '_> = Emoji("📋 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

const DEFAULT_NORMALIZE: &str = r#"tr -s "[:space:]" " ""#;
const DEFAULT_ITEM_PATH: &str = r#"echo "$INDEX - $NAME""#;
const DEFAULT_SANITIZE: &str = r#"tr -d "/|""#;

/// Mirror feeds and playlists with their media into a directory tree
#[derive(Parser, Debug)]
#[command(name = "feedpull")]
#[command(about = "Mirror feeds and playlists with their media into a directory tree")]
#[command(version)]
struct Args {
    /// Feed URL, local feed file or video playlist URL (repeatable)
    #[arg(short = 'u', long = "url", required = true)]
    urls: Vec<String>,

    /// Directory that receives one subdirectory per item
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// User-Agent sent with every request
    #[arg(long, default_value = concat!("feedpull/", env!("CARGO_PKG_VERSION")))]
    user_agent: String,

    /// Make every decision but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Pause a random 0.5-10s after each media download
    #[arg(long)]
    rate_limit: bool,

    /// Shell command rewriting item names (stdin to stdout); empty disables
    #[arg(long, env = "FEEDPULL_NORMALIZE", default_value = DEFAULT_NORMALIZE)]
    normalize: String,

    /// Shell command that must exit 0 for an item to be kept
    #[arg(long, env = "FEEDPULL_INCLUDE")]
    include: Option<String>,

    /// Shell command that drops an item when it exits 0
    #[arg(long, env = "FEEDPULL_EXCLUDE")]
    exclude: Option<String>,

    /// Shell command printing the item directory; sees $INDEX, $NAME and $FEED
    #[arg(long, env = "FEEDPULL_ITEM_PATH", default_value = DEFAULT_ITEM_PATH)]
    item_path: String,

    /// Shell command cleaning up directory and file names; empty disables
    #[arg(long, env = "FEEDPULL_SANITIZE", default_value = DEFAULT_SANITIZE)]
    sanitize: String,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// Log debug details, including filter decisions
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn hook_config(&self) -> HookConfig {
        HookConfig {
            normalize: Some(self.normalize.clone()),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            item_path: Some(self.item_path.clone()),
            sanitize: Some(self.sanitize.clone()),
        }
    }
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, length: Option<u64>, message: String) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);
        bar.set_message(message);

        if let Ok(mut current) = self.download_bar.lock()
            && let Some(old) = current.replace(bar)
        {
            old.finish_and_clear();
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(current) = self.download_bar.lock()
            && let Some(bar) = current.as_ref()
        {
            f(bar);
        }
    }

    fn take_bar(&self) -> Option<ProgressBar> {
        self.download_bar.lock().ok().and_then(|mut b| b.take())
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { source } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Fetching feed: {}", source.cyan()));
            }

            ProgressEvent::ItemsUnified { total_items } => {
                self.main_bar.set_message(format!(
                    "{LIST}{} items found",
                    total_items.to_string().cyan()
                ));
            }

            ProgressEvent::ItemSkipped { .. } | ProgressEvent::ItemUpToDate { .. } => {}

            ProgressEvent::ItemStarting {
                index,
                name,
                media_count,
            } => {
                self.main_bar.set_message(format!(
                    "[{}] {} ({} media)",
                    index.to_string().cyan(),
                    truncate_title(&name, 50).bold(),
                    media_count
                ));
            }

            ProgressEvent::DownloadStarting {
                file_name,
                content_length,
                ..
            } => {
                self.start_bar(content_length, truncate_title(&file_name, 40));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                self.with_bar(|bar| {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                });
            }

            ProgressEvent::DownloadCompleted {
                file_name,
                bytes_downloaded,
            } => {
                if let Some(bar) = self.take_bar() {
                    bar.set_position(bytes_downloaded);
                    bar.finish_and_clear();
                }
                let _ = self.multi.println(format!(
                    "  {SUCCESS}{}",
                    truncate_title(&file_name, 60).green()
                ));
            }

            ProgressEvent::DownloadFailed { file_name, error } => {
                if let Some(bar) = self.take_bar() {
                    bar.finish_and_clear();
                }
                let _ = self.multi.println(format!(
                    "  {FAILURE}{} - {}",
                    truncate_title(&file_name, 30).red(),
                    error.red()
                ));
            }

            ProgressEvent::ItemFinished { .. } => {}

            ProgressEvent::SyncCompleted {
                written_count,
                up_to_date_count,
                skipped_count,
                failed_count,
            } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} written, {} up to date, {} skipped, {} incomplete",
                    "Sync complete:".bold().green(),
                    written_count.to_string().green().bold(),
                    up_to_date_count.to_string().cyan(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("feedpull=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedpull=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Cancel `token` on SIGINT or SIGTERM
async fn cancel_on_signal(token: CancellationToken) {
    wait_for_signal().await;
    tracing::info!("interrupted, stopping after cleanup");
    token.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for Ctrl+C only");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.quiet {
        println!(
            "\n{}{} {}\n",
            SATELLITE,
            "feedpull".bold().magenta(),
            "- Feed Mirror".dimmed()
        );
    }

    let http = ReqwestClient::with_user_agent(&args.user_agent)
        .context("Failed to build HTTP client")?;
    let hooks = Hooks::from_config(&args.hook_config());
    let registry = StaticRegistry::default();

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let ctx = SyncContext {
        http: &http,
        video: &DisabledVideoClient,
        hooks: &hooks,
        registry: &registry,
        reporter,
        cancel,
    };
    let options = SyncOptions {
        dry_run: args.dry_run,
        rate_limit: args.rate_limit,
    };

    let result = sync_feeds(&ctx, &args.urls, &args.output_dir, &options)
        .await
        .context("Failed to sync feeds")?;

    if !args.quiet && !result.failed_media.is_empty() {
        println!("\n{}", "Failed downloads:".red().bold());
        for failure in &result.failed_media {
            println!(
                "  {}{} {} - {}",
                CROSS,
                failure.item_name.yellow(),
                failure.file_name,
                failure.error.dimmed()
            );
        }
    }

    if !args.quiet {
        println!(
            "\n{FOLDER}Output: {}\n",
            args.output_dir.display().to_string().cyan()
        );
    }

    Ok(())
}
