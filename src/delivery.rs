use async_trait::async_trait;
use teloxide::types::InputFile;

use super::*;

/// Telegram rejects some remote URLs it has cached badly; a changed query
/// string makes it fetch the file again.
const BAD_FILE_REFERENCE: &str = "wrong file identifier/HTTP URL specified";
const CACHE_BUSTER: &str = "?new";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MediaKind {
    Photo,
    Document,
}

/// Animated images go out as documents so Telegram keeps them animated.
/// Only the path suffix is checked.
pub(crate) fn media_kind(url: &str) -> MediaKind {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.path().ends_with("gif") => MediaKind::Document,
        _ => MediaKind::Photo,
    }
}

#[async_trait]
pub(crate) trait Messenger: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn send_media(&self, chat_id: i64, kind: MediaKind, url: &str, caption: &str) -> Result<()>;
}

#[async_trait]
impl Messenger for Bot {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        self.send_message(ChatId(chat_id), text.to_string()).await?;
        Ok(())
    }

    async fn send_media(&self, chat_id: i64, kind: MediaKind, url: &str, caption: &str) -> Result<()> {
        let parsed = url::Url::parse(url).with_context(|| format!("parse media url {}", url))?;
        let file = InputFile::url(parsed);
        match kind {
            MediaKind::Photo => {
                self.send_photo(ChatId(chat_id), file)
                    .caption(caption.to_string())
                    .await?;
            }
            MediaKind::Document => {
                self.send_document(ChatId(chat_id), file)
                    .caption(caption.to_string())
                    .await?;
            }
        }
        Ok(())
    }
}

pub(crate) fn is_bad_file_reference(err: &anyhow::Error) -> bool {
    format!("{:#}", err).contains(BAD_FILE_REFERENCE)
}

/// Sends `items` in order and closes with an end-of-post notice.
///
/// The first failure that is not a retried bad-file-reference aborts the
/// rest; the target gets the error text instead of the closing notice.
pub(crate) async fn deliver<M>(messenger: &M, target: i64, items: &[MediaItem]) -> Result<()>
where
    M: Messenger + ?Sized,
{
    for item in items {
        if let Err(err) = send_item(messenger, target, item).await {
            if let Err(notice_err) = messenger.send_text(target, &format!("Error: {}", err)).await {
                error!("send error notice to {} failed: {:#}", target, notice_err);
            }
            return Err(err);
        }
    }
    messenger.send_text(target, END_OF_POST_MESSAGE).await
}

async fn send_item<M>(messenger: &M, target: i64, item: &MediaItem) -> Result<()>
where
    M: Messenger + ?Sized,
{
    let kind = media_kind(&item.url);
    match messenger
        .send_media(target, kind, &item.url, &item.caption)
        .await
    {
        Ok(()) => Ok(()),
        Err(err) if is_bad_file_reference(&err) => {
            let retry_url = format!("{}{}", item.url, CACHE_BUSTER);
            messenger
                .send_media(target, kind, &retry_url, &item.caption)
                .await
        }
        Err(err) => Err(err),
    }
}
