//! Format resolution: classify a media URL into a delivery path

use url::Url;

use crate::types::DeliveryKind;

/// Classify a URL into a delivery kind.
///
/// The path extension is checked first with the query string ignored
/// (`m3u8` -> HLS, `mpd` -> DASH). When the extension is absent or
/// unknown, the literal substrings `.m3u8` / `.mpd` anywhere in the full
/// URL decide instead; this covers extensionless CDN URLs that carry the
/// real path inside a signed query string. Everything else, including
/// malformed URLs, degrades to progressive playback.
pub fn classify(url: &str) -> DeliveryKind {
    if let Ok(parsed) = Url::parse(url) {
        let path = parsed.path().to_ascii_lowercase();
        match std::path::Path::new(&path)
            .extension()
            .and_then(|ext| ext.to_str())
        {
            Some("m3u8") => return DeliveryKind::Hls,
            Some("mpd") => return DeliveryKind::Dash,
            _ => {}
        }
    }

    let lower = url.to_ascii_lowercase();
    if lower.contains(".m3u8") {
        DeliveryKind::Hls
    } else if lower.contains(".mpd") {
        DeliveryKind::Dash
    } else {
        DeliveryKind::Progressive
    }
}
