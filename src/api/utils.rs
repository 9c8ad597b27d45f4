//! API utility functions
//!
//! Pure, stateless helpers shared by the handlers in `services.rs`.

use std::path::Path;

/// Guess a media type from the file extension
///
/// Unknown or missing extensions fall back to `application/octet-stream`.
pub fn content_type_for(path: &Path) -> mime::Mime {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let essence = match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "m4a" | "aac" => "audio/mp4",
        "opus" | "ogg" | "oga" => "audio/ogg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "vtt" => "text/vtt",
        "srt" | "txt" => "text/plain",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        _ => return mime::APPLICATION_OCTET_STREAM,
    };

    essence.parse().unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guess(name: &str) -> String {
        content_type_for(Path::new(name)).to_string()
    }

    #[test]
    fn test_video_and_audio() {
        assert_eq!(guess("abc/clip.mp4"), "video/mp4");
        assert_eq!(guess("clip.M4V"), "video/mp4");
        assert_eq!(guess("clip.webm"), "video/webm");
        assert_eq!(guess("song.mp3"), "audio/mpeg");
        assert_eq!(guess("song.opus"), "audio/ogg");
    }

    #[test]
    fn test_sidecar_files() {
        assert_eq!(guess("clip.en.vtt"), "text/vtt");
        assert_eq!(guess("clip.info.json"), "application/json");
        assert_eq!(guess("thumb.webp"), "image/webp");
    }

    #[test]
    fn test_unknown_is_octet_stream() {
        assert_eq!(guess("archive.part"), "application/octet-stream");
        assert_eq!(guess("README"), "application/octet-stream");
    }
}
