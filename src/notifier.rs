use super::*;
use crate::delivery::deliver;
use crate::helpers::is_fresh;
use crate::ptime::news_offset;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum CycleOutcome {
    NoPosts,
    Stale,
    UpToDate,
    Delivered(usize),
}

pub(crate) fn start_notifier_loop<M>(state: Arc<AppState>, messenger: M, period: Duration)
where
    M: Messenger + 'static,
{
    tokio::spawn(async move {
        let mut interval = poll_interval(period);
        loop {
            interval.tick().await;
            let now = match news_offset() {
                Ok(offset) => chrono::Utc::now().with_timezone(&offset),
                Err(err) => {
                    error!("notifier clock failed: {:#}", err);
                    continue;
                }
            };
            if let Err(err) = run_cycle(&state, &messenger, now).await {
                error!("notifier cycle failed: {:#}", err);
            }
        }
    });
}

/// A slow cycle pushes the next poll back instead of firing a burst.
pub(crate) fn poll_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval
}

/// One poll: refresh the snapshot and push the newest post if it is fresh.
///
/// Subscribers are marked as delivered even when their delivery fails part
/// way, so a post is never pushed twice to the same user.
pub(crate) async fn run_cycle<M>(
    state: &AppState,
    messenger: &M,
    now: DateTime<FixedOffset>,
) -> Result<CycleOutcome>
where
    M: Messenger + ?Sized,
{
    let posts = state
        .client
        .fetch_recent_posts()
        .await
        .context("fetch recent posts")?;
    let snapshot = state.replace_snapshot(posts).await;
    let Some(newest) = snapshot.first() else {
        return Ok(CycleOutcome::NoPosts);
    };

    let window = chrono::Duration::seconds(state.config.staleness_seconds as i64);
    if !is_fresh(newest.created_at.as_ref(), now, window) {
        return Ok(CycleOutcome::Stale);
    }

    let pending = state.store.pending_for(&newest.id).await;
    if pending.is_empty() {
        return Ok(CycleOutcome::UpToDate);
    }

    let items = state
        .client
        .fetch_post_media(&newest.id)
        .await
        .with_context(|| format!("fetch post {}", newest.id))?;

    info!(
        "sending post {} ({} items) to {} subscribers",
        newest.id,
        items.len(),
        pending.len()
    );
    for user_id in &pending {
        if let Err(err) = deliver(messenger, *user_id, &items).await {
            warn!("post {} to {} failed: {:#}", newest.id, user_id, err);
        }
        if let Err(err) = state.store.mark_delivered(*user_id, &newest.id).await {
            error!("mark post {} delivered to {} failed: {:#}", newest.id, user_id, err);
        }
    }

    Ok(CycleOutcome::Delivered(pending.len()))
}
