use crate::error::AppError;
use reqwest::Url;

const DEMO_PLAYER: &str = "https://hlsjs.video-dev.org/demo/";

/// Checks a manually entered stream URL. Only HLS manifests are accepted.
pub fn validate_locator(input: &str) -> Result<String, AppError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AppError::EmptyOrInvalidLocator(
            "enter a stream URL".to_string(),
        ));
    }
    if !trimmed.contains("m3u8") {
        return Err(AppError::EmptyOrInvalidLocator(
            "URL must point to an .m3u8 playlist".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Browser-playable URL for a locator the terminal player could not open.
pub fn embed_url(locator: &str) -> String {
    if let Some(id) = youtube_id(locator) {
        return format!("https://www.youtube.com/embed/{}", id);
    }

    match Url::parse_with_params(DEMO_PLAYER, &[("src", locator)]) {
        Ok(url) => url.to_string(),
        Err(_) => DEMO_PLAYER.to_string(),
    }
}

fn youtube_id(locator: &str) -> Option<String> {
    let url = Url::parse(locator).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");

    match host {
        "youtu.be" => url
            .path_segments()?
            .next()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()),
        "youtube.com" => {
            if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
                return Some(v.into_owned()).filter(|s| !s.is_empty());
            }
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("live") | Some("embed") => segments
                    .next()
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}
