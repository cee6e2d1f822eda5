use super::*;

/// Subscriber list and like counter, mirrored to a single JSON file.
///
/// Every mutation rewrites the whole file while holding the state lock, so
/// the notifier and command handlers never interleave writes. Changes are
/// built on a copy and only kept once the file write succeeds.
pub(crate) struct SubscriberStore {
    path: PathBuf,
    state: Mutex<BotState>,
}

impl SubscriberStore {
    /// A missing file is a first run. A file that exists but cannot be read or
    /// parsed is an error: starting empty would drop every subscriber on the
    /// next write.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let state = if path.exists() {
            let data = fs::read_to_string(path)
                .with_context(|| format!("read data file {}", path.display()))?;
            serde_json::from_str(&data)
                .with_context(|| format!("parse data file {}", path.display()))?
        } else {
            info!("no data file at {}, starting empty", path.display());
            BotState::default()
        };
        Ok(SubscriberStore {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        })
    }

    pub(crate) async fn snapshot(&self) -> BotState {
        self.state.lock().await.clone()
    }

    pub(crate) async fn subscribe(&self, user_id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.subscribers.iter().any(|s| s.user_id == user_id) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.subscribers.push(Subscriber {
            user_id,
            post_id: None,
        });
        save_state(&self.path, &next)?;
        *state = next;
        Ok(true)
    }

    /// Removes every entry for `user_id`, duplicates included.
    pub(crate) async fn unsubscribe(&self, user_id: i64) -> Result<bool> {
        let mut state = self.state.lock().await;
        if !state.subscribers.iter().any(|s| s.user_id == user_id) {
            return Ok(false);
        }
        let mut next = state.clone();
        next.subscribers.retain(|s| s.user_id != user_id);
        save_state(&self.path, &next)?;
        *state = next;
        Ok(true)
    }

    pub(crate) async fn add_like(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.total_likes += 1;
        save_state(&self.path, &next)?;
        *state = next;
        Ok(state.total_likes)
    }

    /// Subscribers that have not been sent `post_id` yet, in file order.
    pub(crate) async fn pending_for(&self, post_id: &str) -> Vec<i64> {
        let state = self.state.lock().await;
        let mut pending: Vec<i64> = Vec::new();
        for subscriber in &state.subscribers {
            if subscriber.post_id.as_deref() != Some(post_id) && !pending.contains(&subscriber.user_id) {
                pending.push(subscriber.user_id);
            }
        }
        pending
    }

    pub(crate) async fn mark_delivered(&self, user_id: i64, post_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.subscribers.iter().any(|s| s.user_id == user_id) {
            // Unsubscribed while the post was being sent.
            return Ok(());
        }
        let mut next = state.clone();
        for subscriber in next.subscribers.iter_mut().filter(|s| s.user_id == user_id) {
            subscriber.post_id = Some(post_id.to_string());
        }
        save_state(&self.path, &next)?;
        *state = next;
        Ok(())
    }
}

fn save_state(path: &Path, state: &BotState) -> Result<()> {
    let data = serde_json::to_vec_pretty(state).context("serialize bot data")?;
    atomic_write(path, &data).with_context(|| format!("write data file {}", path.display()))
}
