use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Url};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crag_gallery::api::GraphqlClient;
use crag_gallery::commands::MediaCommands;
use crag_gallery::config::{self, Config};
use crag_gallery::gallery::GalleryStore;
use crag_gallery::invalidate::{CacheInvalidationFanout, HttpInvalidator};
use crag_gallery::model::{split_ancestors, GalleryConnection, NewEmbeddedEntityTag, TagTargetKind};
use crag_gallery::notice::LogNotifier;
use crag_gallery::session::{FetchOutcome, GallerySession};
use crag_gallery::storage::{DirStorage, MediaStorage, SignedUrlStorage};
use crag_gallery::upload::{content_type_for, PhotoUploader, UploadFile, UploadLimits, UploadOptions};

#[derive(Debug, Parser)]
#[command(author, version, about = "User photo gallery client")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Page through a user's gallery and print it
    Gallery {
        #[arg(long)]
        user: String,
        /// Stop after this many pages
        #[arg(long, default_value = "10")]
        pages: u32,
        /// Treat the viewer as the gallery owner
        #[arg(long)]
        authorized: bool,
    },
    /// Revalidate every page showing media tagged with an entity
    Invalidate {
        #[arg(long)]
        entity: String,
        #[arg(long, value_parser = parse_kind)]
        kind: TagTargetKind,
        /// Comma-separated ancestor area ids
        #[arg(long, default_value = "")]
        ancestors: String,
    },
    /// Upload photos to a user's gallery
    Upload {
        #[arg(long)]
        user: String,
        files: Vec<PathBuf>,
        /// Tag uploads with this climb
        #[arg(long, conflicts_with = "tag_area")]
        tag_climb: Option<String>,
        /// Tag uploads with this area
        #[arg(long)]
        tag_area: Option<String>,
        /// Use the upload as the profile avatar
        #[arg(long)]
        profile: bool,
        /// Store bytes in a local directory instead of the bucket
        #[arg(long)]
        storage_dir: Option<PathBuf>,
    },
    /// Delete one photo and its stored bytes
    Delete {
        #[arg(long)]
        media_id: String,
        #[arg(long)]
        media_url: String,
    },
    /// Print an example configuration
    PrintConfig,
}

fn parse_kind(s: &str) -> Result<TagTargetKind, String> {
    TagTargetKind::parse_kind(s).ok_or_else(|| format!("unknown tag kind '{}' (area|climb)", s))
}

struct Clients {
    commands: MediaCommands,
    api: Arc<GraphqlClient>,
    store: GalleryStore,
}

fn build(cfg: &Config, storage: Option<Arc<dyn MediaStorage>>) -> Result<Clients> {
    let http = Client::builder()
        .user_agent("crag-gallery/0.1")
        .build()
        .context("failed to build HTTP client")?;
    let token = cfg.auth_token();
    let graphql_url = Url::parse(&cfg.api.graphql_url).context("invalid api.graphql_url")?;
    let site_url = Url::parse(&cfg.site.base_url).context("invalid site.base_url")?;

    let api = Arc::new(GraphqlClient::new(http.clone(), graphql_url, token.clone()));
    let storage = match storage {
        Some(s) => s,
        None => Arc::new(SignedUrlStorage::new(http.clone(), site_url.clone(), token)),
    };
    let fanout = CacheInvalidationFanout::new(Arc::new(HttpInvalidator::new(http, site_url)));
    let store = GalleryStore::new();
    let commands = MediaCommands::new(api.clone(), storage, fanout, store.clone(), Arc::new(LogNotifier));
    Ok(Clients { commands, api, store })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let load = || config::load(Some(&args.config));

    match args.command {
        Command::Gallery { user, pages, authorized } => {
            let cfg = load()?;
            let ctx = build(&cfg, None)?;
            let session = GallerySession::new(ctx.store.clone(), ctx.api, Arc::new(LogNotifier), user)
                .with_page_size(cfg.app.page_size);

            // Visitors start from the first page, as the server would render it.
            let initial = if authorized {
                GalleryConnection::default()
            } else {
                ctx.commands
                    .fetch_more_media_forward(session.user_uuid(), cfg.app.page_size, None)
                    .await
                    .ok_or_else(|| anyhow!("failed to load first gallery page"))?
            };
            if !session.initialize(initial, authorized).await {
                bail!("failed to initialize gallery");
            }

            for _ in 1..pages {
                match session.fetch_more().await {
                    FetchOutcome::Appended(n) => info!(added = n, "loaded page"),
                    FetchOutcome::Exhausted => break,
                    FetchOutcome::Failed => bail!("failed to load next gallery page"),
                    other => warn!(?other, "page not loaded"),
                }
            }
            session.close();

            let snap = ctx.store.snapshot();
            println!("{} photo(s), showing {}", snap.page_info.total_items, snap.edges.len());
            for edge in &snap.edges {
                let tags: Vec<&str> = edge.node.entity_tags.iter().map(|t| t.display_name()).collect();
                println!("{}  {}  [{}]", edge.node.id, edge.node.media_url, tags.join(", "));
            }
        }
        Command::Invalidate { entity, kind, ancestors } => {
            let cfg = load()?;
            let ctx = build(&cfg, None)?;
            let report = ctx
                .commands
                .invalidate_entity_pages(&entity, kind, &split_ancestors(&ancestors))
                .await;
            println!("invalidated {} of {} page(s)", report.attempted.len() - report.failed.len(), report.attempted.len());
            for key in &report.failed {
                println!("failed: {}", key);
            }
        }
        Command::Upload { user, files, tag_climb, tag_area, profile, storage_dir } => {
            if files.is_empty() {
                bail!("no files given");
            }
            let cfg = load()?;
            let storage: Option<Arc<dyn MediaStorage>> = storage_dir
                .map(|dir| Arc::new(DirStorage::new(dir, user.clone())) as Arc<dyn MediaStorage>);
            let ctx = build(&cfg, storage)?;

            let entity_tag = match (tag_climb, tag_area) {
                (Some(id), _) => Some(NewEmbeddedEntityTag { entity_id: id, entity_type: TagTargetKind::Climb }),
                (None, Some(id)) => Some(NewEmbeddedEntityTag { entity_id: id, entity_type: TagTargetKind::Area }),
                (None, None) => None,
            };
            let opts = UploadOptions { entity_tag, is_profile_photo: profile };

            let mut batch = Vec::with_capacity(files.len());
            for path in &files {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("failed to read file: {}", path.display()))?;
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| anyhow!("invalid file name: {}", path.display()))?
                    .to_string();
                batch.push(UploadFile { name, content_type: content_type_for(path).to_string(), bytes });
            }

            let uploader = PhotoUploader::new(ctx.commands, user, UploadLimits::from(&cfg.app));
            let summary = uploader.upload_all(batch, &opts).await;
            for media in &summary.uploaded {
                println!("uploaded {} -> {}", media.id, media.media_url);
            }
            for (name, err) in &summary.failed {
                println!("failed {}: {}", name, err);
            }
            if summary.has_errors() {
                bail!("{} upload(s) failed", summary.failed.len());
            }
        }
        Command::Delete { media_id, media_url } => {
            let cfg = load()?;
            let ctx = build(&cfg, None)?;
            ctx.commands.delete_one_media_object(&media_id, &media_url).await?;
            println!("deleted {}", media_id);
        }
        Command::PrintConfig => print!("{}", config::example()),
    }

    Ok(())
}
