//! Upload request and result types

use chat_core::traits::Id;
use chat_models::Attachment;
use serde::{Deserialize, Serialize};

use crate::preview::PreviewOutcome;

/// Parameters for creating an attachment from an upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAttachmentParams {
    /// Channel receiving the upload message
    pub channel_id: Id,
    /// File name as given by the uploader
    pub name: String,
    /// Declared upload size in bytes
    pub size: i64,
}

impl CreateAttachmentParams {
    pub fn new(channel_id: Id, name: impl Into<String>, size: i64) -> Self {
        Self {
            channel_id,
            name: name.into(),
            size,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct CreatedAttachment {
    /// The persisted attachment
    pub attachment: Attachment,
    /// Message the attachment was bound to
    pub message_id: Id,
    pub preview: PreviewOutcome,
}

/// File extension of an upload name, without the dot.
///
/// Leading and trailing dots are ignored, so dotfiles have no extension:
/// `".bashrc"` gives `""` and `"archive.tar.gz."` gives `"gz"`.
pub fn extract_extension(name: &str) -> String {
    let trimmed = name.trim_matches('.');
    let file = trimmed.rsplit('/').next().unwrap_or(trimmed);

    match file.rfind('.') {
        Some(pos) => file[pos..].trim_matches('.').to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_extension() {
        assert_eq!(extract_extension("photo.jpg"), "jpg");
        assert_eq!(extract_extension("Photo.JPEG"), "JPEG");
        assert_eq!(extract_extension(".bashrc"), "");
        assert_eq!(extract_extension("archive.tar.gz."), "gz");
        assert_eq!(extract_extension("README"), "");
        assert_eq!(extract_extension("..."), "");
        assert_eq!(extract_extension(""), "");
    }

    #[test]
    fn test_extension_from_last_segment() {
        assert_eq!(extract_extension("dir.d/file"), "");
        assert_eq!(extract_extension("some/dir/image.png"), "png");
    }

    #[test]
    fn test_params_builder() {
        let params = CreateAttachmentParams::new(7, "cat.gif", 2048);
        assert_eq!(params.channel_id, 7);
        assert_eq!(params.name, "cat.gif");
        assert_eq!(params.size, 2048);
    }
}
