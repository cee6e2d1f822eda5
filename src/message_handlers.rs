use super::*;
use crate::delivery::deliver;
use crate::helpers::render_post_list;
use crate::ptime::{day_of_month, parse_day_token};

/// Telegram refuses empty messages, so an empty listing gets this instead.
const EMPTY_LIST_MESSAGE: &str = "No posts yet.";

pub(super) async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let text = match msg.text() {
        Some(text) => text.to_string(),
        None => return Ok(()),
    };
    let username = msg
        .from()
        .and_then(|user| user.username.clone())
        .unwrap_or_default();
    info!("[{}] {}", username, text);

    dispatch_text(&bot, msg.chat.id.0, &text, &state).await
}

/// Routes one message by its exact text.
pub(super) async fn dispatch_text<M>(
    messenger: &M,
    chat_id: i64,
    text: &str,
    state: &AppState,
) -> Result<()>
where
    M: Messenger + ?Sized,
{
    match text {
        "/list" => handle_list_command(messenger, chat_id, state).await,
        "/subscribe" => handle_subscribe_command(messenger, chat_id, state).await,
        "/unsubscribe" => handle_unsubscribe_command(messenger, chat_id, state).await,
        LIKE_TOKEN => handle_like(messenger, chat_id, state).await,
        _ => match parse_day_token(text) {
            Ok(day) => handle_day_request(messenger, chat_id, day, state).await,
            Err(_) => messenger.send_text(chat_id, HELP_MESSAGE).await,
        },
    }
}

async fn handle_list_command<M>(messenger: &M, chat_id: i64, state: &AppState) -> Result<()>
where
    M: Messenger + ?Sized,
{
    let snapshot = state.snapshot().await;
    let listing = render_post_list(&snapshot, &state.config.title_prefix);
    if listing.is_empty() {
        return messenger.send_text(chat_id, EMPTY_LIST_MESSAGE).await;
    }
    messenger.send_text(chat_id, &listing).await
}

async fn handle_subscribe_command<M>(messenger: &M, chat_id: i64, state: &AppState) -> Result<()>
where
    M: Messenger + ?Sized,
{
    let reply = match state.store.subscribe(chat_id).await {
        Ok(true) => "Subscribed!",
        Ok(false) => "You've already subscribed. No need to subscribe again.",
        Err(err) => {
            error!("subscribe {} failed: {:#}", chat_id, err);
            ERROR_MESSAGE
        }
    };
    messenger.send_text(chat_id, reply).await
}

async fn handle_unsubscribe_command<M>(messenger: &M, chat_id: i64, state: &AppState) -> Result<()>
where
    M: Messenger + ?Sized,
{
    let reply = match state.store.unsubscribe(chat_id).await {
        Ok(true) => "Unsubscribed!",
        Ok(false) => "You don't have any subscription to unsubscribe.",
        Err(err) => {
            error!("unsubscribe {} failed: {:#}", chat_id, err);
            ERROR_MESSAGE
        }
    };
    messenger.send_text(chat_id, reply).await
}

async fn handle_like<M>(messenger: &M, chat_id: i64, state: &AppState) -> Result<()>
where
    M: Messenger + ?Sized,
{
    let reply = match state.store.add_like().await {
        Ok(total) => {
            info!("like from {}, {} total", chat_id, total);
            "Thank you."
        }
        Err(err) => {
            error!("record like failed: {:#}", err);
            ERROR_MESSAGE
        }
    };
    messenger.send_text(chat_id, reply).await
}

/// Sends the first snapshot post created on `day`, subscribed or not.
async fn handle_day_request<M>(messenger: &M, chat_id: i64, day: u32, state: &AppState) -> Result<()>
where
    M: Messenger + ?Sized,
{
    let snapshot = state.snapshot().await;
    let Some(post) = snapshot
        .iter()
        .find(|post| day_of_month(post.created_at.as_ref()) == Some(day))
    else {
        return messenger.send_text(chat_id, NO_SUCH_POST_MESSAGE).await;
    };

    match state.client.fetch_post_media(&post.id).await {
        Ok(items) => {
            if let Err(err) = deliver(messenger, chat_id, &items).await {
                warn!("post {} to {} failed: {:#}", post.id, chat_id, err);
            }
            Ok(())
        }
        Err(err) => {
            error!("fetch post {} failed: {:#}", post.id, err);
            messenger.send_text(chat_id, ERROR_MESSAGE).await
        }
    }
}
