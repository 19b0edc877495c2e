use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pdfbucket::bookmark::Bookmarks;
use pdfbucket::document_list::{DocumentList, ListStatus, entry_summary};
use pdfbucket::library::{resolve_library_paths, resolve_log_path};
use pdfbucket::panic_handler::initialize_panic_handler;
use pdfbucket::pdf::MupdfEngine;
use pdfbucket::settings::Settings;
use pdfbucket::store::{ObjectStore, S3Gateway};
use pdfbucket::thumbnail::Thumbnail;
use pdfbucket::upload::{UploadControl, UploadFile};
use pdfbucket::viewer::{PageTarget, Phase, Viewer};
use pdfbucket::{App, Error};

const LOAD_TIMEOUT: Duration = Duration::from_secs(120);
const THUMBNAIL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Parser)]
#[command(name = "pdfbucket", version)]
#[command(about = "Browse, read and bookmark PDF documents stored in S3")]
struct Cli {
    /// Settings file (defaults to the per-user config.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    bucket: Option<String>,

    #[arg(long, global = true)]
    region: Option<String>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List PDF documents, newest first.
    List {
        /// Also write a thumbnail of each document into this directory
        #[arg(long, value_name = "DIR")]
        thumbnails: Option<PathBuf>,
    },
    /// Upload a local PDF, keyed by its file name.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Open a document and render one page.
    View {
        #[arg(value_name = "KEY")]
        key: String,
        /// 1-based page (defaults to the bookmark, then page 1)
        #[arg(long)]
        page: Option<usize>,
        /// Zoom percent, 50-200
        #[arg(long)]
        zoom: Option<u32>,
        /// Container width in pixels the page is fitted into
        #[arg(long)]
        width: Option<f32>,
        /// Write the rendered page as PNG
        #[arg(long, value_name = "PNG")]
        output: Option<PathBuf>,
        /// Remember the shown page for next time
        #[arg(long)]
        save_bookmark: bool,
    },
    /// Show saved bookmarks for the bucket.
    Bookmarks,
}

fn main() -> Result<()> {
    initialize_panic_handler();
    let cli = Cli::parse();

    // Settings loading logs too, so the logger comes up before the configured level is known.
    init_logging(verbosity(LevelFilter::Info, cli.verbose));

    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(bucket) = cli.bucket {
        settings.store.bucket = Some(bucket);
    }
    if let Some(region) = cli.region {
        settings.store.region = Some(region);
    }

    log::set_max_level(verbosity(settings.log_level_filter(), cli.verbose));
    info!("Starting pdfbucket {}", env!("CARGO_PKG_VERSION"));

    let result = run(cli.command, &settings);
    if let Err(e) = &result {
        error!("Command failed: {e:?}");
    }
    info!("Shutting down pdfbucket");
    result
}

/// `-v` raises the configured level to debug, `-vv` to trace.
fn verbosity(configured: LevelFilter, verbose: u8) -> LevelFilter {
    match verbose {
        0 => configured,
        1 => configured.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    }
}

/// The logger itself accepts everything; `log::set_max_level` does the filtering.
fn init_logging(level: LevelFilter) {
    let file = resolve_log_path().and_then(|path| {
        File::create(&path).with_context(|| format!("Failed to create log file {path:?}"))
    });
    match file {
        Ok(file) => {
            if WriteLogger::init(LevelFilter::Trace, Config::default(), file).is_ok() {
                log::set_max_level(level);
            }
        }
        Err(e) => eprintln!("Logging disabled: {e:#}"),
    }
}

fn run(command: Commands, settings: &Settings) -> Result<()> {
    match command {
        Commands::List { thumbnails } => run_list(settings, thumbnails.as_deref()),
        Commands::Upload { file } => run_upload(settings, &file),
        Commands::View {
            key,
            page,
            zoom,
            width,
            output,
            save_bookmark,
        } => run_view(
            settings,
            &key,
            ViewOptions {
                page,
                zoom,
                width,
                output,
                save_bookmark,
            },
        ),
        Commands::Bookmarks => run_bookmarks(settings),
    }
}

fn open_store(settings: &Settings) -> Result<Arc<dyn ObjectStore>> {
    let gateway = S3Gateway::from_settings(&settings.store).context("Failed to set up S3")?;
    Ok(Arc::new(gateway))
}

fn bucket_name(settings: &Settings) -> &str {
    settings.store.bucket.as_deref().unwrap_or_default()
}

fn open_bookmarks(settings: &Settings) -> Result<Bookmarks> {
    let paths = resolve_library_paths(bucket_name(settings))?;
    Ok(Bookmarks::load_or_ephemeral(Some(&paths.bookmarks_file)))
}

fn user_facing(err: Error) -> anyhow::Error {
    let message = err.user_message();
    anyhow!(err).context(message)
}

fn print_list(list: &DocumentList) {
    if let Some(message) = list.message() {
        println!("{message}");
    }
    for entry in list.entries() {
        println!("{}", entry.key);
        println!("    {}", entry_summary(entry));
    }
}

fn run_list(settings: &Settings, thumbnails: Option<&Path>) -> Result<()> {
    let store = open_store(settings)?;

    let Some(dir) = thumbnails else {
        let list = DocumentList::load(store.as_ref(), &settings.store.prefix);
        print_list(&list);
        return match list.status() {
            ListStatus::Failed(message) => bail!(message),
            _ => Ok(()),
        };
    };

    fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;
    let bookmarks = open_bookmarks(settings)?;
    let mut app = App::new(store, Arc::new(MupdfEngine::new()), Box::new(bookmarks), settings);
    app.wait_for_thumbnails(THUMBNAIL_TIMEOUT);
    print_list(app.list());

    for entry in app.list().entries() {
        let Thumbnail::Image(uri) = app.list().thumbnail(&entry.key) else {
            println!("{}: no thumbnail", entry.key);
            continue;
        };
        let path = dir.join(format!("{}.png", thumbnail_file_stem(&entry.key)));
        write_data_uri(uri, &path)?;
        println!("{}: {}", entry.key, path.display());
    }
    Ok(())
}

fn thumbnail_file_stem(key: &str) -> String {
    pdfbucket::document_list::display_title(key)
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

fn write_data_uri(uri: &str, path: &Path) -> Result<()> {
    let encoded = uri
        .split_once(";base64,")
        .map(|(_, data)| data)
        .context("Thumbnail is not a base64 data URI")?;
    let bytes = STANDARD.decode(encoded).context("Thumbnail is not valid base64")?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {path:?}"))
}

fn run_upload(settings: &Settings, file: &Path) -> Result<()> {
    let store = open_store(settings)?;
    let mut control = UploadControl::new();
    control
        .select_file(UploadFile::from_path(file)?)
        .map_err(user_facing)?;
    if let Some(selected) = control.selected() {
        println!("Uploading {}", selected.summary());
    }

    let progress = control.progress();
    let (done_tx, done_rx) = flume::bounded::<()>(1);
    let printer = std::thread::spawn(move || {
        while let Err(flume::RecvTimeoutError::Timeout) =
            done_rx.recv_timeout(Duration::from_millis(200))
        {
            eprint!("\r{:>3}%", progress.percent());
            let _ = std::io::stderr().flush();
        }
    });

    let result = control.upload(store.as_ref());
    drop(done_tx);
    let _ = printer.join();
    eprintln!("\r{:>3}%", control.progress().percent());

    let receipt = result.map_err(user_facing)?;
    println!("Uploaded {}", receipt.key);
    Ok(())
}

struct ViewOptions {
    page: Option<usize>,
    zoom: Option<u32>,
    width: Option<f32>,
    output: Option<PathBuf>,
    save_bookmark: bool,
}

fn run_view(settings: &Settings, key: &str, options: ViewOptions) -> Result<()> {
    let store = open_store(settings)?;
    let mut list = DocumentList::try_load(store.as_ref(), &settings.store.prefix)
        .map_err(user_facing)?;
    let descriptor = list.select(store.as_ref(), key).map_err(user_facing)?;

    let mut viewer_settings = settings.viewer.clone();
    if let Some(width) = options.width {
        viewer_settings.container_width = width;
    }
    let bookmarks = open_bookmarks(settings)?;
    let mut viewer = Viewer::new(
        Arc::new(MupdfEngine::new()),
        Box::new(bookmarks),
        &viewer_settings,
    );

    viewer.select_document(descriptor);
    settle(&mut viewer)?;

    if let Some(page) = options.page {
        viewer.go_to_page(PageTarget::Absolute(page));
    }
    if let Some(zoom) = options.zoom {
        viewer.set_zoom(zoom);
    }
    settle(&mut viewer)?;

    if let Some(error) = viewer.last_error() {
        bail!("{}: {error}", error.user_message());
    }
    let shown = viewer
        .displayed_page()
        .context("No page was rendered")?;

    println!(
        "{} - page {} of {} at {}% ({}x{} px)",
        viewer.title().unwrap_or_default(),
        shown.page,
        viewer.page_count(),
        viewer.state().zoom.percent(),
        shown.raster.width(),
        shown.raster.height()
    );

    if let Some(path) = &options.output {
        let png = shown.raster.encode_png()?;
        fs::write(path, png).with_context(|| format!("Failed to write {path:?}"))?;
        println!("Wrote {}", path.display());
    }

    if options.save_bookmark {
        viewer.save_bookmark().map_err(user_facing)?;
        if let Some(notification) = viewer.notifications().current() {
            println!("{}", notification.message);
        }
    }
    Ok(())
}

fn settle(viewer: &mut Viewer) -> Result<()> {
    if !viewer.settle(LOAD_TIMEOUT) {
        bail!("Timed out waiting for the document");
    }
    if viewer.phase() == Phase::LoadError {
        let message = viewer
            .last_error()
            .map_or("Failed to load PDF", Error::user_message);
        bail!(message);
    }
    Ok(())
}

fn run_bookmarks(settings: &Settings) -> Result<()> {
    let bookmarks = open_bookmarks(settings)?;
    if bookmarks.is_empty() {
        println!("No bookmarks yet.");
        return Ok(());
    }

    let mut entries: Vec<_> = bookmarks.iter().collect();
    entries.sort_by(|a, b| b.1.last_read.cmp(&a.1.last_read));
    for (key, bookmark) in entries {
        println!(
            "{key}  page {}  (saved {})",
            bookmark.page,
            bookmark.last_read.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
