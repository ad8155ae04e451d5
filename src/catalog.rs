use crate::error::AppError;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSource {
    pub id: String,
    pub title: String,
    pub url: String,
    pub category: Option<String>,
    pub live: bool,
}

// First non-empty string wins.
const URL_KEYS: &[&str] = &["url", "stream_url", "streamUrl", "m3u8", "hls", "src", "link"];
const LIST_KEYS: &[&str] = &["matches", "streams", "sources", "channels", "data"];

pub async fn fetch_catalog(client: &Client, url: &str) -> Result<Vec<StreamSource>, AppError> {
    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(AppError::CatalogFetchFailed(format!(
            "HTTP {} from {}",
            resp.status(),
            url
        )));
    }

    let json = resp.json::<Value>().await?;
    let sources = parse_catalog(&json);
    info!(count = sources.len(), "catalog loaded");
    Ok(sources)
}

/// Decodes whatever shape the remote document has into a list of playable
/// sources. Entries without a URL are dropped, never the whole document.
pub fn parse_catalog(v: &Value) -> Vec<StreamSource> {
    let entries: Vec<(Option<&str>, &Value)> = if let Some(arr) = v.as_array() {
        arr.iter().map(|e| (None, e)).collect()
    } else if let Some(arr) = LIST_KEYS
        .iter()
        .find_map(|k| v.get(*k).and_then(|x| x.as_array()))
    {
        arr.iter().map(|e| (None, e)).collect()
    } else if let Some(obj) = v.as_object() {
        obj.iter().map(|(k, e)| (Some(k.as_str()), e)).collect()
    } else {
        Vec::new()
    };

    let mut sources = Vec::new();
    for (i, (key, entry)) in entries.into_iter().enumerate() {
        match entry.as_object().and_then(|obj| extract_source(obj, key, i + 1)) {
            Some(source) => sources.push(source),
            None => warn!(position = i + 1, "skipping catalog entry without a stream URL"),
        }
    }
    sources
}

fn extract_source(obj: &Map<String, Value>, key: Option<&str>, position: usize) -> Option<StreamSource> {
    let url = URL_KEYS
        .iter()
        .filter_map(|k| obj.get(*k).and_then(|x| x.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())?
        .to_string();

    let title = obj
        .get("title")
        .or_else(|| obj.get("name"))
        .or_else(|| obj.get("displayTitle"))
        .or_else(|| obj.get("event"))
        .and_then(|x| x.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Stream {}", position));

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => key
            .map(|k| k.to_string())
            .unwrap_or_else(|| format!("stream-{}", position)),
    };

    let category = obj
        .get("category")
        .or_else(|| obj.get("sport"))
        .or_else(|| obj.get("league"))
        .and_then(|x| x.as_str())
        .map(|s| s.to_string());

    let live = obj
        .get("live")
        .or_else(|| obj.get("isLive"))
        .or_else(|| obj.get("is_live"))
        .map(|x| match x {
            Value::Bool(b) => *b,
            Value::String(s) => s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("live"),
            _ => false,
        })
        .unwrap_or(false);

    Some(StreamSource {
        id,
        title,
        url,
        category,
        live,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn matches_array_skips_entries_without_url() {
        let doc = json!({
            "matches": [
                {"name": "Final", "url": "https://a.example/final.m3u8", "live": true, "sport": "Football"},
                {"name": "No link here"},
                {"url": "https://a.example/other.m3u8"},
            ]
        });
        let sources = parse_catalog(&doc);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].title, "Final");
        assert!(sources[0].live);
        assert_eq!(sources[0].category.as_deref(), Some("Football"));
        // position counts the skipped entry too
        assert_eq!(sources[1].title, "Stream 3");
        assert_eq!(sources[1].id, "stream-3");
        assert!(!sources[1].live);
    }

    #[test]
    fn top_level_array() {
        let doc = json!([{"title": "A", "stream_url": "http://x/a.m3u8", "id": 7}]);
        let sources = parse_catalog(&doc);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "7");
        assert_eq!(sources[0].url, "http://x/a.m3u8");
    }

    #[test]
    fn object_of_entries_uses_keys_as_ids() {
        let doc = json!({
            "derby": {"displayTitle": "Derby", "hls": "http://x/derby.m3u8", "isLive": "true"},
            "broken": "not an object",
        });
        let sources = parse_catalog(&doc);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].id, "derby");
        assert_eq!(sources[0].title, "Derby");
        assert!(sources[0].live);
    }

    #[test]
    fn url_key_priority_is_stable() {
        let doc = json!([{"link": "http://x/link", "m3u8": "http://x/m.m3u8", "url": "http://x/url.m3u8"}]);
        assert_eq!(parse_catalog(&doc)[0].url, "http://x/url.m3u8");

        let doc = json!([{"link": "http://x/link", "m3u8": "http://x/m.m3u8", "url": ""}]);
        assert_eq!(parse_catalog(&doc)[0].url, "http://x/m.m3u8");
    }

    #[test]
    fn non_string_url_is_ignored() {
        let doc = json!([{"url": 12, "name": "Numbers"}]);
        assert!(parse_catalog(&doc).is_empty());
    }

    #[test]
    fn object_entries_keep_document_order() {
        let doc: Value = serde_json::from_str(
            r#"{"zulu": {"url": "http://x/z.m3u8"}, "alpha": {"url": "http://x/a.m3u8"}}"#,
        )
        .unwrap();
        let sources = parse_catalog(&doc);
        assert_eq!(sources[0].id, "zulu");
        assert_eq!(sources[0].title, "Stream 1");
        assert_eq!(sources[1].id, "alpha");
        assert_eq!(sources[1].title, "Stream 2");
    }

    #[test]
    fn scalar_document_yields_nothing() {
        assert!(parse_catalog(&json!(42)).is_empty());
        assert!(parse_catalog(&json!(null)).is_empty());
    }

    /// Serves one canned HTTP response and returns the URL to fetch it from.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}/streams.json", addr)
    }

    fn client() -> Client {
        Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn server_error_is_a_fetch_failure() {
        let url = serve_once("500 Internal Server Error", "oops").await;
        let err = fetch_catalog(&client(), &url).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogFetchFailed(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn invalid_body_is_a_fetch_failure() {
        let url = serve_once("200 OK", "<html>not json</html>").await;
        let err = fetch_catalog(&client(), &url).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogFetchFailed(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = fetch_catalog(&client(), &format!("http://{}/streams.json", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CatalogFetchFailed(_)));
    }

    #[tokio::test]
    async fn matches_document_is_decoded() {
        let url = serve_once(
            "200 OK",
            r#"{"matches":[{"name":"Final","url":"https://a.example/final.m3u8","live":true},{"name":"dead"}]}"#,
        )
        .await;
        let sources = fetch_catalog(&client(), &url).await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].title, "Final");
        assert_eq!(sources[0].url, "https://a.example/final.m3u8");
        assert!(sources[0].live);
    }
}
