use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use flock::app::{App, AppEvent};
use flock::cache::{CacheStore, Item, ItemId, MemoryCacheStore, Partition, PartitionKey, Patcher, UserId};
use flock::config::Config;
use flock::feed::FeedLoader;
use flock::mutation::Dispatcher;
use flock::session::Session;
use flock::storage::{Database, DatabaseError};
use flock::ui::{run_until_idle, Exit, ItemCard, MenuAction, PointerListeners};
use flock::util::{display_width, one_line_preview};

/// Node id of the action menu; the CLI has no document, only the menu.
const MENU_NODE: u64 = 1;

/// Columns given to item content in text listings.
const PREVIEW_WIDTH: usize = 60;

/// Get the config directory path (~/.config/flock/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("flock"))
}

#[derive(Parser, Debug)]
#[command(name = "flock", about = "Optimistic feed mutations over a cached timeline")]
struct Args {
    /// SQLite database file (overrides `database_path` from the config)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/flock/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Act as this user
    #[arg(long, value_name = "USER")]
    viewer: Option<UserId>,

    /// Print partitions as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create demo users, follows and tweets in an empty database
    Seed,
    /// Load a feed into the cache and print it
    Feed {
        /// Only authors the viewer follows
        #[arg(long, conflicts_with = "profile")]
        following: bool,
        /// One user's tweets
        #[arg(long, value_name = "USER")]
        profile: Option<UserId>,
        /// Pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },
    /// Toggle the viewer's like on a tweet
    Like { id: ItemId },
    /// Replace a tweet's content
    Edit { id: ItemId, text: String },
    /// Delete a tweet
    Delete { id: ItemId },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = match args.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
            config_dir.join("flock.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db.with_max_content_length(config.max_content_length),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let session = match args.viewer {
        Some(id) if db.user_exists(id).await? => Session::authenticated(id),
        Some(id) => anyhow::bail!("User {id} does not exist"),
        None => Session::Unauthenticated,
    };

    let store = Arc::new(MemoryCacheStore::new(config.cache_partitions));
    let loader = FeedLoader::new(Arc::new(db.clone()), store.clone(), session.viewer_id())
        .with_page_size(config.page_size);

    match args.command {
        Command::Seed => {
            let summary = db.seed_demo().await.context("Failed to seed database")?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Seeded {} users, {} follows, {} tweets, {} likes into {}",
                    summary.users,
                    summary.follows,
                    summary.tweets,
                    summary.likes,
                    db_path.display()
                );
            }
        }
        Command::Feed {
            following,
            profile,
            pages,
        } => {
            let key = match (following, profile) {
                (_, Some(user_id)) => PartitionKey::profile(user_id),
                (true, None) => PartitionKey::FOLLOWING,
                (false, None) => PartitionKey::GLOBAL,
            };
            for _ in 0..pages.max(1) {
                if !loader.load_next_page(key).await? {
                    break;
                }
            }
            let partition = store.read(&key).unwrap_or_default();
            print_partitions(&[(key, partition)], args.json)?;
        }
        Command::Like { id } => {
            mutate(&db, store, loader, session, &config, id, args.json, |card, app, tx| {
                card.toggle_like(&app.dispatcher, tx)?;
                Ok(())
            })
            .await?;
        }
        Command::Edit { id, text } => {
            mutate(&db, store, loader, session, &config, id, args.json, |card, app, tx| {
                card.choose(MenuAction::Edit, &app.dispatcher, tx)?;
                card.set_draft(&text);
                card.submit_edit(&app.dispatcher, tx)?;
                Ok(())
            })
            .await?;
        }
        Command::Delete { id } => {
            mutate(&db, store, loader, session, &config, id, args.json, |card, app, tx| {
                card.choose(MenuAction::Delete, &app.dispatcher, tx)?;
                Ok(())
            })
            .await?;
        }
    }

    Ok(())
}

/// Load every partition the item appears in, run `action` on its card, and
/// print the partitions once optimistically and once settled.
#[allow(clippy::too_many_arguments)]
async fn mutate<F>(
    db: &Database,
    store: Arc<MemoryCacheStore>,
    loader: FeedLoader,
    session: Session,
    config: &Config,
    item_id: ItemId,
    json: bool,
    action: F,
) -> Result<()>
where
    F: FnOnce(&mut ItemCard, &App<Database>, &mpsc::Sender<AppEvent>) -> Result<()>,
{
    if !session.is_authenticated() {
        anyhow::bail!("--viewer is required to modify tweets");
    }
    let item = db
        .get_tweet(session.viewer_id(), item_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Tweet {item_id} not found"))?;
    let keys = PartitionKey::affected_by(item.author.id);

    // Scroll each feed until the item shows up or the feed runs out.
    for key in keys {
        while !store.read(&key).is_some_and(|p| p.contains(item_id)) && loader.has_more(&key) {
            loader.load_next_page(key).await?;
        }
    }

    let dispatcher = Dispatcher::new(
        Arc::new(db.clone()),
        Patcher::new(store.clone()),
        session.clone(),
    )
    .with_max_content_length(config.max_content_length);
    let mut app = App::new(dispatcher, loader);

    let cached = keys
        .iter()
        .find_map(|key| store.read(key).and_then(|p| p.find(item_id).cloned()))
        .unwrap_or_else(|| Arc::new(item));
    let listeners = PointerListeners::new();
    let mut card = ItemCard::new(
        cached,
        &session,
        &listeners,
        MENU_NODE,
        config.max_content_length,
    );

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(32);
    action(&mut card, &app, &event_tx)?;
    drop(event_tx);

    let snapshot = || -> Vec<(PartitionKey, Partition)> {
        keys.iter()
            .map(|key| (*key, store.read(key).unwrap_or_default()))
            .collect()
    };

    if !json {
        println!("-- optimistic --");
    }
    print_partitions(&snapshot(), json)?;

    match run_until_idle(&mut app, &mut event_rx).await? {
        Exit::Idle => {}
        Exit::Interrupted => anyhow::bail!("Interrupted before the server answered"),
        Exit::Disconnected => anyhow::bail!("Mutation result was lost"),
    }

    if !json {
        println!("-- settled --");
    }
    print_partitions(&snapshot(), json)?;

    if let Some((message, _)) = app.status_message.take() {
        anyhow::bail!("{message}");
    }
    Ok(())
}

fn print_partitions(partitions: &[(PartitionKey, Partition)], json: bool) -> Result<()> {
    if json {
        let value: Vec<_> = partitions
            .iter()
            .map(|(key, partition)| {
                serde_json::json!({
                    "partition": key.to_string(),
                    "has_more": partition.has_more(),
                    "pages": partition.pages,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (key, partition) in partitions {
        println!(
            "== {} ({} items in {} pages{}) ==",
            key,
            partition.len(),
            partition.pages.len(),
            if partition.has_more() { ", more available" } else { "" }
        );
        for item in partition.items() {
            println!("{}", format_item(item));
        }
    }
    Ok(())
}

fn format_item(item: &Item) -> String {
    const NAME_WIDTH: usize = 10;
    let name = item.author.name.as_deref().unwrap_or("?");
    let name = one_line_preview(name, NAME_WIDTH);
    let padding = " ".repeat(NAME_WIDTH.saturating_sub(display_width(&name)));
    format!(
        "#{:<5} @{}{} {:>3}{} {}",
        item.id,
        name,
        padding,
        item.like_count,
        if item.liked_by_me { "♥" } else { " " },
        one_line_preview(&item.content, PREVIEW_WIDTH)
    )
}
