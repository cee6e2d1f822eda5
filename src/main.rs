mod delivery;
mod helpers;
mod message_handlers;
mod news;
mod notifier;
mod ptime;
mod store;


use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::Parser;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use tokio::sync::{Mutex, RwLock};

use crate::delivery::Messenger;
use crate::helpers::{atomic_write, load_config};
use crate::news::NewsClient;
use crate::store::SubscriberStore;

const DEFAULT_DATA_FILE: &str = "botdata.json";
const TOKEN_ENV: &str = "BOTAPI";

const LIKE_TOKEN: &str = "\u{1F44D}";
const ERROR_MESSAGE: &str = "Something went wrong.";
const NO_SUCH_POST_MESSAGE: &str = "No such post.";
const END_OF_POST_MESSAGE: &str = "End of the post. You can /list other posts or visit /help.";
const HELP_MESSAGE: &str = "You can:

/list recent posts
/subscribe for new posts
/unsubscribe if you've subscribed";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
struct Config {
    list_url: String,
    /// `{id}` is replaced with the post id.
    article_url: String,
    poll_interval_seconds: u64,
    staleness_seconds: u64,
    request_timeout_seconds: u64,
    title_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            list_url: "https://c.m.163.com/nc/subscribe/list/T1454661781964/all/0-25.html"
                .to_string(),
            article_url: "https://c.m.163.com/nc/article/{id}/full.html".to_string(),
            poll_interval_seconds: 10,
            staleness_seconds: 10 * 60,
            request_timeout_seconds: 30,
            title_prefix: "每日易乐:".to_string(),
        }
    }
}

#[derive(Parser, Debug)]
struct Args {
    /// Subscriber data file.
    #[arg(long, default_value = DEFAULT_DATA_FILE)]
    data: PathBuf,
    /// Optional TOML file overriding endpoints and timings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Post {
    id: String,
    title: String,
    /// `None` when the feed reports `ptime: null`.
    created_at: Option<DateTime<FixedOffset>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct MediaItem {
    url: String,
    caption: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
struct Subscriber {
    user_id: i64,
    #[serde(default)]
    post_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
struct BotState {
    #[serde(default)]
    total_likes: u64,
    #[serde(default)]
    subscribers: Vec<Subscriber>,
}

struct AppState {
    config: Config,
    client: NewsClient,
    store: SubscriberStore,
    latest_posts: RwLock<Arc<Vec<Post>>>,
}

impl AppState {
    fn new(config: Config, client: NewsClient, store: SubscriberStore) -> Self {
        AppState {
            config,
            client,
            store,
            latest_posts: RwLock::new(Arc::new(Vec::new())),
        }
    }

    async fn snapshot(&self) -> Arc<Vec<Post>> {
        self.latest_posts.read().await.clone()
    }

    async fn replace_snapshot(&self, posts: Vec<Post>) -> Arc<Vec<Post>> {
        let posts = Arc::new(posts);
        *self.latest_posts.write().await = posts.clone();
        posts
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let token = std::env::var(TOKEN_ENV).with_context(|| format!("read {} env", TOKEN_ENV))?;

    let store = SubscriberStore::load(&args.data)?;
    let client = NewsClient::new(&config)?;
    let state = Arc::new(AppState::new(config.clone(), client, store));

    let bot = Bot::new(token);
    let me = bot.get_me().await.context("get bot identity")?;
    info!("Started {}", me.username());

    notifier::start_notifier_loop(
        state.clone(),
        bot.clone(),
        Duration::from_secs(config.poll_interval_seconds),
    );

    let handler = dptree::entry().branch(Update::filter_message().endpoint(message_handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        // One key for every update: messages are handled strictly in arrival order.
        .distribution_function(|_| Some(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
