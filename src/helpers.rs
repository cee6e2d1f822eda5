use std::io::Write;

use super::*;

pub(super) fn load_config(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: Config = toml::from_str(&contents).context("parse config")?;
    if config.poll_interval_seconds == 0 {
        return Err(anyhow!("poll_interval_seconds must be positive"));
    }
    Ok(config)
}

pub(super) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(anyhow!("no parent dir for {}", path.display())),
    };
    fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(data).context("write temp file")?;
    tmp.flush().context("flush temp file")?;
    tmp.as_file_mut().sync_all().context("sync temp file")?;
    tmp.persist(path)
        .map_err(|e| anyhow!("persist temp file: {}", e))?;
    Ok(())
}

/// Strips the feed's title prefix once, the way `/list` shows titles.
pub(super) fn display_title<'a>(title: &'a str, prefix: &str) -> std::borrow::Cow<'a, str> {
    if prefix.is_empty() || !title.contains(prefix) {
        return std::borrow::Cow::Borrowed(title);
    }
    std::borrow::Cow::Owned(title.replacen(prefix, "", 1))
}

pub(super) fn render_post_list(posts: &[Post], prefix: &str) -> String {
    posts
        .iter()
        .map(|post| {
            format!(
                "{} {}",
                crate::ptime::format_day(post.created_at.as_ref()),
                display_title(&post.title, prefix)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fresh means created no later than `now` and no more than `window` ago.
pub(super) fn is_fresh(
    created_at: Option<&DateTime<FixedOffset>>,
    now: DateTime<FixedOffset>,
    window: chrono::Duration,
) -> bool {
    let Some(created_at) = created_at else {
        return false;
    };
    let age = now.signed_duration_since(*created_at);
    age >= chrono::Duration::zero() && age <= window
}
