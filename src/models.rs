//! Entity types for the wardrobe catalogue.
//!
//! Outfits and calendar events reference clothing items by id, not by
//! ownership: deleting an item leaves the reference dangling and readers
//! resolve it lazily, dropping missing targets.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The active account as supplied by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Physical and styling attributes of one identity. One per scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub gender: Gender,
    pub height_cm: u32,
    pub weight_kg: u32,
    /// Descriptive label, e.g. "Warm Olive".
    pub skin_tone: String,
    /// Hex color for rendering layers downstream.
    pub skin_tone_hex: String,
    #[serde(default)]
    pub style_preference: Option<String>,
    /// Base64-encoded full-body reference photo.
    #[serde(default)]
    pub body_photo: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClothingCategory {
    Top,
    Bottom,
    Dress,
    Shoes,
    Outerwear,
    Accessory,
}

impl ClothingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClothingCategory::Top => "Top",
            ClothingCategory::Bottom => "Bottom",
            ClothingCategory::Dress => "Dress",
            ClothingCategory::Shoes => "Shoes",
            ClothingCategory::Outerwear => "Outerwear",
            ClothingCategory::Accessory => "Accessory",
        }
    }
}

impl std::fmt::Display for ClothingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One digitized garment. Immutable once created except by explicit delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClothingItem {
    pub id: String,
    /// Base64-encoded image payload.
    pub image: String,
    pub category: ClothingCategory,
    pub color: String,
    pub style: String,
    #[serde(default)]
    pub material: Option<String>,
    pub description: String,
    pub added_at: DateTime<Utc>,
}

impl ClothingItem {
    /// Build a catalogue entry from raw image bytes and a classification.
    pub fn from_classification(image_bytes: &[u8], record: ClassificationRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            image: encode_image(image_bytes),
            category: record.category.unwrap_or(ClothingCategory::Accessory),
            color: record.color,
            style: record.style,
            material: if record.material.is_empty() {
                None
            } else {
                Some(record.material)
            },
            description: record.description,
            added_at: Utc::now(),
        }
    }
}

/// Structured fields returned by garment classification.
///
/// All fields are optional in the wire response; `Default` is the empty
/// record handed to the manual-entry path when the AI is not configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    #[serde(default)]
    pub category: Option<ClothingCategory>,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub description: String,
}

/// One of the four canonical camera angles of a turnaround.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viewpoint {
    Front,
    Left,
    Right,
    Back,
}

impl Viewpoint {
    /// Fixed generation order of a turnaround batch.
    pub const ALL: [Viewpoint; 4] = [
        Viewpoint::Front,
        Viewpoint::Left,
        Viewpoint::Right,
        Viewpoint::Back,
    ];

    /// Label used in the generation prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Viewpoint::Front => "Front View",
            Viewpoint::Left => "Left Side Profile",
            Viewpoint::Right => "Right Side Profile",
            Viewpoint::Back => "Back View (Rear)",
        }
    }
}

impl std::fmt::Display for Viewpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Viewpoint::Front => "front",
            Viewpoint::Left => "left",
            Viewpoint::Right => "right",
            Viewpoint::Back => "back",
        };
        f.write_str(name)
    }
}

/// Four generated renderings of an outfit on the reference photo.
///
/// All four fields are mandatory: a partially generated batch is never
/// representable, let alone persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryOnImageSet {
    pub front: String,
    pub left: String,
    pub right: String,
    pub back: String,
}

/// A saved combination of catalogue items, referenced by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outfit {
    pub id: String,
    pub item_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub ai_feedback: Option<String>,
    #[serde(default)]
    pub try_on: Option<TryOnImageSet>,
}

impl Outfit {
    pub fn new(item_ids: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            item_ids,
            created_at: Utc::now(),
            notes: None,
            ai_feedback: None,
            try_on: None,
        }
    }
}

/// A planned occasion. Never mutated, never auto-deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// ISO date of the occasion.
    pub date: String,
    pub title: String,
    pub outfit_id: String,
}

/// A social-feed post. The outfit is an embedded snapshot, not a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedLook {
    pub id: String,
    pub author: String,
    pub outfit: Outfit,
    pub likes: u32,
    pub comments: Vec<String>,
}

impl SharedLook {
    pub fn new(author: impl Into<String>, outfit: Outfit) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            outfit,
            likes: 0,
            comments: Vec::new(),
        }
    }
}

/// Stylist suggestion for an occasion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutfitSuggestion {
    #[serde(default)]
    pub suggestion: String,
    #[serde(default)]
    pub recommended_item_ids: Vec<String>,
}

/// Encode raw image bytes into the stored payload form.
pub fn encode_image(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a stored payload back into raw bytes.
pub fn decode_image(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(strip_data_url(payload))
}

/// Strip a `data:image/...;base64,` prefix if present. Payloads imported
/// from browser exports carry one; freshly encoded payloads do not.
pub fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:image/") => rest,
        _ => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_payload_round_trip() {
        let bytes = vec![0u8, 1, 2, 255, 128];
        let payload = encode_image(&bytes);
        assert_eq!(decode_image(&payload).unwrap(), bytes);
    }

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_url("QUJD"), "QUJD");
    }

    #[test]
    fn test_item_from_classification() {
        let record = ClassificationRecord {
            category: Some(ClothingCategory::Top),
            color: "Sage Green".to_string(),
            style: "Minimalist".to_string(),
            material: "Ribbed Cotton".to_string(),
            description: "A fitted ribbed top".to_string(),
        };
        let item = ClothingItem::from_classification(b"img", record);
        assert_eq!(item.category, ClothingCategory::Top);
        assert_eq!(item.material.as_deref(), Some("Ribbed Cotton"));
        assert!(!item.id.is_empty());
    }

    #[test]
    fn test_empty_material_maps_to_none() {
        let item = ClothingItem::from_classification(b"img", ClassificationRecord::default());
        assert_eq!(item.material, None);
        assert_eq!(item.category, ClothingCategory::Accessory);
    }

    #[test]
    fn test_viewpoint_order_and_labels() {
        let labels: Vec<&str> = Viewpoint::ALL.iter().map(|v| v.prompt_label()).collect();
        assert_eq!(
            labels,
            vec![
                "Front View",
                "Left Side Profile",
                "Right Side Profile",
                "Back View (Rear)"
            ]
        );
    }
}
