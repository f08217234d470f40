//! Deterministic MIME-based classification fallback.
//!
//! Scans file descriptors in a fixed priority order: image beats video beats
//! audio, and anything without an audiovisual MIME type is treated as a
//! document. The first match decides, so a mixed upload of a photo and a PDF
//! routes to the image specialist.

use super::{HandlerKind, Modality};
use crate::query::FileDescriptor;

/// Confidence assigned when an audiovisual MIME type matches directly.
pub(crate) const MIME_MATCH_CONFIDENCE: f64 = 0.9;
/// Confidence assigned to the document fallback.
pub(crate) const DOCUMENT_FALLBACK_CONFIDENCE: f64 = 0.7;

/// Result of the MIME scan: modality, handler, confidence, and why.
pub(crate) struct MimeVerdict {
    pub(crate) modality: Modality,
    pub(crate) handler: HandlerKind,
    pub(crate) confidence: f64,
    pub(crate) reasoning: String,
}

/// Classify purely from MIME types. Callers guarantee at least one file.
pub(crate) fn classify_by_mime(files: &[FileDescriptor]) -> MimeVerdict {
    let classes = [
        ("image", Modality::Image, HandlerKind::Image),
        ("video", Modality::Video, HandlerKind::Video),
        ("audio", Modality::Audio, HandlerKind::Audio),
    ];

    for (class, modality, handler) in classes {
        if let Some(file) = files.iter().find(|file| file.is_mime_class(class)) {
            return MimeVerdict {
                modality,
                handler,
                confidence: MIME_MATCH_CONFIDENCE,
                reasoning: format!(
                    "Matched {} ({}) as {class} content",
                    file.filename, file.mime_type
                ),
            };
        }
    }

    MimeVerdict {
        modality: Modality::Document,
        handler: HandlerKind::Document,
        confidence: DOCUMENT_FALLBACK_CONFIDENCE,
        reasoning: "No audiovisual MIME types present; treating files as documents".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(name: &str, mime: &str) -> FileDescriptor {
        FileDescriptor {
            filename: name.into(),
            mime_type: mime.into(),
            size_bytes: 64,
            storage_path: PathBuf::from(format!("/tmp/{name}")),
        }
    }

    #[test]
    fn image_wins_over_video_and_audio() {
        let files = vec![
            file("talk.mp3", "audio/mpeg"),
            file("clip.mp4", "video/mp4"),
            file("cat.png", "image/png"),
        ];

        let verdict = classify_by_mime(&files);
        assert_eq!(verdict.modality, Modality::Image);
        assert_eq!(verdict.handler, HandlerKind::Image);
        assert!((verdict.confidence - MIME_MATCH_CONFIDENCE).abs() < f64::EPSILON);
        assert!(verdict.reasoning.contains("cat.png"));
    }

    #[test]
    fn video_wins_over_audio() {
        let files = vec![file("talk.mp3", "audio/mpeg"), file("clip.mp4", "video/mp4")];

        let verdict = classify_by_mime(&files);
        assert_eq!(verdict.modality, Modality::Video);
        assert_eq!(verdict.handler, HandlerKind::Video);
    }

    #[test]
    fn lone_audio_file_routes_to_audio() {
        let verdict = classify_by_mime(&[file("take.mp3", "audio/mpeg")]);
        assert_eq!(verdict.modality, Modality::Audio);
        assert_eq!(verdict.handler, HandlerKind::Audio);
        assert!((verdict.confidence - MIME_MATCH_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_mime_types_fall_back_to_document() {
        let files = vec![
            file("report.pdf", "application/pdf"),
            file("data.bin", "application/octet-stream"),
        ];

        let verdict = classify_by_mime(&files);
        assert_eq!(verdict.modality, Modality::Document);
        assert_eq!(verdict.handler, HandlerKind::Document);
        assert!((verdict.confidence - DOCUMENT_FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
    }

    #[test]
    fn garbage_mime_strings_still_classify() {
        let verdict = classify_by_mime(&[file("weird", ""), file("weirder", "///")]);
        assert_eq!(verdict.modality, Modality::Document);
    }
}
