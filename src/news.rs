use std::collections::HashMap;

use scraper::{Html, Node};

use super::*;
use crate::ptime::deserialize_ptime;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FetchError {
    #[error("request {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("post {0} missing from detail payload")]
    MissingPost(String),
}

#[derive(Deserialize)]
struct PostList {
    #[serde(rename = "tab_list", default)]
    posts: Vec<RemotePost>,
}

#[derive(Deserialize)]
struct RemotePost {
    #[serde(rename = "postid")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "ptime", default, deserialize_with = "deserialize_ptime")]
    created_at: Option<DateTime<FixedOffset>>,
}

#[derive(Deserialize)]
struct PostDocument {
    #[serde(rename = "img", default)]
    images: Vec<PostImage>,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
pub(crate) struct PostImage {
    #[serde(rename = "ref")]
    pub(crate) reference: String,
    #[serde(rename = "src")]
    pub(crate) url: String,
}

/// Client for the post list and post detail endpoints.
pub(crate) struct NewsClient {
    http: reqwest::Client,
    list_url: String,
    article_url: String,
}

impl NewsClient {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("build http client")?;
        Ok(NewsClient {
            http,
            list_url: config.list_url.clone(),
            article_url: config.article_url.clone(),
        })
    }

    /// Newest first, as the feed returns them.
    pub(crate) async fn fetch_recent_posts(&self) -> Result<Vec<Post>, FetchError> {
        let list: PostList = self.get_json(&self.list_url).await?;
        Ok(list
            .posts
            .into_iter()
            .map(|p| Post {
                id: p.id,
                title: p.title,
                created_at: p.created_at,
            })
            .collect())
    }

    pub(crate) async fn fetch_post_media(&self, post_id: &str) -> Result<Vec<MediaItem>, FetchError> {
        let url = self.article_url.replace("{id}", post_id);
        let mut documents: HashMap<String, PostDocument> = self.get_json(&url).await?;
        let document = documents
            .remove(post_id)
            .ok_or_else(|| FetchError::MissingPost(post_id.to_string()))?;
        Ok(extract_media(&document.images, &document.body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let network = |source: reqwest::Error| FetchError::Network {
            url: url.to_string(),
            source,
        };
        let body = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(network)?
            .text()
            .await
            .map_err(network)?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Image table refs come wrapped as `<!--IMG#0-->`, body comments carry `IMG#0`.
pub(crate) fn normalize_ref(reference: &str) -> String {
    reference.replace("<!--", "").replace("-->", "")
}

pub(crate) fn extract_media(images: &[PostImage], body: &str) -> Vec<MediaItem> {
    let refs: HashMap<String, &str> = images
        .iter()
        .map(|img| (normalize_ref(&img.reference), img.url.as_str()))
        .collect();
    let mut pairing = CaptionPairing::new(&refs);
    visit_markup(body, |node| pairing.visit(node));
    pairing.finish()
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum MarkupNode<'a> {
    Text(&'a str),
    Comment(&'a str),
}

/// Depth-first, pre-order walk over the text and comment nodes of `body`.
pub(crate) fn visit_markup<F>(body: &str, mut visit: F)
where
    F: FnMut(MarkupNode<'_>),
{
    let document = Html::parse_document(body);
    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Text(text) => visit(MarkupNode::Text(&**text)),
            Node::Comment(comment) => visit(MarkupNode::Comment(&**comment)),
            _ => {}
        }
    }
}

/// Pairs image markers with the last text seen before them.
///
/// The caption is positional, not structural: `last_text` is whatever text
/// node came last in traversal order, even from an unrelated branch. Feed
/// posts rely on this layout, so it must not be tightened to siblings.
pub(crate) struct CaptionPairing<'r> {
    refs: &'r HashMap<String, &'r str>,
    last_text: String,
    items: Vec<MediaItem>,
}

impl<'r> CaptionPairing<'r> {
    pub(crate) fn new(refs: &'r HashMap<String, &'r str>) -> Self {
        CaptionPairing {
            refs,
            last_text: String::new(),
            items: Vec::new(),
        }
    }

    pub(crate) fn visit(&mut self, node: MarkupNode<'_>) {
        match node {
            MarkupNode::Text(text) => self.last_text = text.trim().to_string(),
            MarkupNode::Comment(data) => {
                if let Some(url) = self.refs.get(data) {
                    self.items.push(MediaItem {
                        url: url.to_string(),
                        caption: self.last_text.clone(),
                    });
                }
            }
        }
    }

    pub(crate) fn finish(self) -> Vec<MediaItem> {
        self.items
    }
}
