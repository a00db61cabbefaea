use serde::{Deserialize, Serialize};

/// Discriminates the shape of a message payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Link,
    Image,
    Video,
    File,
    AudioRecording,
    ContactBundle,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Link => "link",
            ContentType::Image => "image",
            ContentType::Video => "video",
            ContentType::File => "file",
            ContentType::AudioRecording => "audio_recording",
            ContentType::ContactBundle => "contact_bundle",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextParams {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParams {
    #[serde(default)]
    pub text: String,
    pub url: String,
}

/// Shared by image, video and file messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaParams {
    pub file_name: String,
    pub file_uri: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioParams {
    pub file_uri: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBundle {
    pub name: String,
    pub bundle_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactBundleParams {
    pub bundle: ContactBundle,
}

/// Message payload. The variant fixes the content type, so a payload can
/// never disagree with the type it is sent under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "content_type", content = "data", rename_all = "snake_case")]
pub enum MessageData {
    Text(TextParams),
    Link(LinkParams),
    Image(MediaParams),
    Video(MediaParams),
    File(MediaParams),
    AudioRecording(AudioParams),
    ContactBundle(ContactBundleParams),
}

impl MessageData {
    pub fn content_type(&self) -> ContentType {
        match self {
            MessageData::Text(_) => ContentType::Text,
            MessageData::Link(_) => ContentType::Link,
            MessageData::Image(_) => ContentType::Image,
            MessageData::Video(_) => ContentType::Video,
            MessageData::File(_) => ContentType::File,
            MessageData::AudioRecording(_) => ContentType::AudioRecording,
            MessageData::ContactBundle(_) => ContentType::ContactBundle,
        }
    }

    /// Text shown as the latest message of a connection in the chat list.
    pub fn preview_text(&self) -> String {
        match self {
            MessageData::Text(params) => params.preview_text(),
            MessageData::Link(params) => params.preview_text(),
            MessageData::Image(params) => params.preview_text(ContentType::Image),
            MessageData::Video(params) => params.preview_text(ContentType::Video),
            MessageData::File(params) => params.preview_text(ContentType::File),
            MessageData::AudioRecording(params) => params.preview_text(),
            MessageData::ContactBundle(params) => params.preview_text(),
        }
    }
}

impl TextParams {
    pub fn preview_text(&self) -> String {
        self.text.clone()
    }
}

impl LinkParams {
    pub fn preview_text(&self) -> String {
        if self.text.trim().is_empty() {
            self.url.clone()
        } else {
            self.text.clone()
        }
    }
}

impl MediaParams {
    /// `content_type` picks the icon; anything but image or video reads as a file.
    pub fn preview_text(&self, content_type: ContentType) -> String {
        let (icon, fallback) = match content_type {
            ContentType::Image => ("📷", "image"),
            ContentType::Video => ("🎥", "video"),
            _ => ("📎", self.file_name.as_str()),
        };

        match self.caption.as_deref().map(str::trim) {
            Some(caption) if !caption.is_empty() => format!("{icon} {caption}"),
            _ => format!("{icon} {fallback}"),
        }
    }
}

impl AudioParams {
    pub fn preview_text(&self) -> String {
        let total_secs = self.duration_ms / 1_000;
        format!("🔊 audio ({}:{:02})", total_secs / 60, total_secs % 60)
    }
}

impl ContactBundleParams {
    pub fn preview_text(&self) -> String {
        format!("👤 shared contact of {}", self.bundle.name)
    }
}
