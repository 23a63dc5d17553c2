//! Attachment model
//!
//! Table: attachments, message_attachment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Id, Identifiable, SoftDeletable, Timestamped};

/// Mimetype prefix shared by every image type
pub const IMAGE_MIMETYPE_PREFIX: &str = "image/";

/// Decoded image properties
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub width: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub height: u32,
    #[serde(default)]
    pub animated: bool,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Metadata of a stored file (original or preview)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    #[serde(default)]
    pub size: i64,
    #[serde(rename = "ext", default)]
    pub extension: String,
    #[serde(default)]
    pub mimetype: String,
    /// Present only after a successful image decode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageMeta>,
}

impl FileMeta {
    pub fn is_image(&self) -> bool {
        self.mimetype.starts_with(IMAGE_MIMETYPE_PREFIX)
    }

    pub fn width(&self) -> u32 {
        self.image.map(|i| i.width).unwrap_or(0)
    }

    pub fn height(&self) -> u32 {
        self.image.map(|i| i.height).unwrap_or(0)
    }

    pub fn is_animated(&self) -> bool {
        self.image.map(|i| i.animated).unwrap_or(false)
    }
}

/// Stored as JSON in `attachments.meta`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    pub original: FileMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<FileMeta>,
}

/// An uploaded file: metadata plus storage pointers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Id,
    pub user_id: Id,
    /// Storage path of the original blob; empty until saved
    pub url: String,
    /// Storage path of the preview blob; empty when no preview exists
    pub preview_url: String,
    /// Trimmed display name
    pub name: String,
    pub meta: AttachmentMeta,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Attachment {
    /// Create an attachment for an upload; the name is trimmed
    pub fn new(id: Id, user_id: Id, name: &str) -> Self {
        Self {
            id,
            user_id,
            url: String::new(),
            preview_url: String::new(),
            name: name.trim().to_string(),
            meta: AttachmentMeta::default(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    /// Check if the original was sniffed as an image
    pub fn is_image(&self) -> bool {
        self.meta.original.is_image()
    }

    pub fn has_preview(&self) -> bool {
        !self.preview_url.is_empty()
    }

    /// Record decoded dimensions of the original
    pub fn set_original_image_meta(&mut self, width: u32, height: u32, animated: bool) {
        self.meta.original.image = Some(ImageMeta {
            width,
            height,
            animated,
        });
    }

    /// Record the preview metadata and return it for further changes
    pub fn set_preview_meta(&mut self, meta: FileMeta) -> &mut FileMeta {
        self.meta.preview.insert(meta)
    }
}

impl Identifiable for Attachment {
    fn id(&self) -> Id {
        self.id
    }
}

impl Timestamped for Attachment {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

impl SoftDeletable for Attachment {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// Join row linking an attachment to the message it was uploaded through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub attachment_id: Id,
    pub message_id: Id,
}

/// Attachment loaded through its message binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAttachment {
    pub message_id: Id,
    #[serde(flatten)]
    pub attachment: Attachment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_name() {
        let attachment = Attachment::new(1, 2, "  photo.jpg \n");
        assert_eq!(attachment.name, "photo.jpg");
        assert!(attachment.url.is_empty());
        assert!(!attachment.has_preview());
        assert!(!attachment.is_deleted());
    }

    #[test]
    fn test_is_image() {
        let mut attachment = Attachment::new(1, 2, "photo.jpg");
        assert!(!attachment.is_image());

        attachment.meta.original.mimetype = "image/jpeg".to_string();
        assert!(attachment.is_image());

        attachment.meta.original.mimetype = "application/pdf".to_string();
        assert!(!attachment.is_image());
    }

    #[test]
    fn test_meta_json_shape() {
        let mut attachment = Attachment::new(1, 2, "anim.gif");
        attachment.meta.original = FileMeta {
            size: 1024,
            extension: "gif".to_string(),
            mimetype: "image/gif".to_string(),
            image: None,
        };
        attachment.set_original_image_meta(10, 20, true);

        let json = serde_json::to_value(&attachment.meta).unwrap();
        assert_eq!(json["original"]["ext"], "gif");
        assert_eq!(json["original"]["image"]["width"], 10);
        assert_eq!(json["original"]["image"]["animated"], true);
        assert!(json.get("preview").is_none());

        let back: AttachmentMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back, attachment.meta);
    }

    #[test]
    fn test_set_preview_meta() {
        let mut attachment = Attachment::new(1, 2, "photo.png");
        let preview = attachment.set_preview_meta(FileMeta {
            image: Some(ImageMeta {
                width: 800,
                height: 150,
                animated: false,
            }),
            ..FileMeta::default()
        });
        preview.size = 4096;
        preview.mimetype = "image/jpeg".to_string();

        let stored = attachment.meta.preview.as_ref().unwrap();
        assert_eq!(stored.size, 4096);
        assert_eq!(stored.width(), 800);
        assert_eq!(stored.height(), 150);
        assert!(!stored.is_animated());
    }
}
