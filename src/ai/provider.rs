use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::AiError;
use crate::models::{
    strip_data_url, ClassificationRecord, ClothingItem, OutfitSuggestion, Profile, Viewpoint,
};

/// Trait for generative providers backing the AI client.
///
/// All three calls are read-only upstream and safe to re-issue, which is
/// what allows the retry executor to wrap them blindly.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Classify one garment image (base64 payload) into structured fields.
    async fn classify(&self, image: &str) -> Result<ClassificationRecord, AiError>;

    /// Render the reference photo wearing `items` from one viewpoint.
    /// Returns the generated image as a base64 payload.
    async fn generate_view(
        &self,
        reference: &str,
        items: &[ClothingItem],
        viewpoint: Viewpoint,
    ) -> Result<String, AiError>;

    /// Pick an outfit from the inventory for an occasion.
    async fn suggest_outfit(
        &self,
        profile: &Profile,
        inventory: &[ClothingItem],
        occasion: &str,
    ) -> Result<OutfitSuggestion, AiError>;

    /// Whether credentials are present. When false every call fails fast
    /// with [`AiError::NotConfigured`].
    fn is_configured(&self) -> bool;

    /// Provider name for display and logs.
    fn provider_name(&self) -> &'static str;
}

// ============================================================================
// Gemini provider (generateContent REST surface)
// ============================================================================

pub struct GeminiProvider {
    endpoint: String,
    model: String,
    image_model: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn jpeg(payload: &str) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/jpeg".to_string(),
                data: strip_data_url(payload).to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

impl GenerationConfig {
    fn json() -> Option<Self> {
        Some(Self {
            response_mime_type: "application/json".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
    #[serde(rename = "inlineData")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    data: String,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .find_map(|p| p.text.as_deref())
    }

    fn first_inline_image(self) -> Option<String> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.inline_data.map(|d| d.data))
    }
}

impl GeminiProvider {
    pub fn new(endpoint: &str, model: &str, image_model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            image_model: image_model.to_string(),
            api_key: api_key.map(|s| s.to_string()),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        let mut provider = Self::new(
            &config.endpoint,
            &config.model,
            &config.image_model,
            config.resolved_api_key().as_deref(),
        );
        provider.timeout = Duration::from_secs(config.timeout_secs);
        provider
    }

    /// Issue one generateContent call off the async executor.
    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::NotConfigured)?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, model, api_key
        );
        let timeout = self.timeout;

        // ureq is blocking; keep it off the cooperative executor.
        tokio::task::spawn_blocking(move || post_generate(&url, &request, timeout))
            .await
            .map_err(|e| AiError::Remote(format!("request task failed: {e}")))?
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn classify(&self, image: &str) -> Result<ClassificationRecord, AiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::jpeg(image), Part::text(CLASSIFY_PROMPT)],
            }],
            generation_config: GenerationConfig::json(),
        };

        let response = self.generate(&self.model, request).await?;
        let text = response
            .first_text()
            .ok_or_else(|| AiError::InvalidResponse("no text in classification response".into()))?;

        serde_json::from_str(&extract_json(text))
            .map_err(|e| AiError::InvalidResponse(format!("classification JSON: {e}")))
    }

    async fn generate_view(
        &self,
        reference: &str,
        items: &[ClothingItem],
        viewpoint: Viewpoint,
    ) -> Result<String, AiError> {
        let mut parts = Vec::with_capacity(items.len() + 2);
        // The reference photo goes first; the prompt relies on that order.
        parts.push(Part::jpeg(reference));
        for item in items {
            parts.push(Part::jpeg(&item.image));
        }
        parts.push(Part::text(view_prompt(items, viewpoint)));

        let request = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: None,
        };

        let response = self.generate(&self.image_model, request).await?;
        response.first_inline_image().ok_or_else(|| {
            AiError::InvalidResponse(format!("no image generated for {viewpoint} view"))
        })
    }

    async fn suggest_outfit(
        &self,
        profile: &Profile,
        inventory: &[ClothingItem],
        occasion: &str,
    ) -> Result<OutfitSuggestion, AiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::text(suggestion_prompt(profile, inventory, occasion))],
            }],
            generation_config: GenerationConfig::json(),
        };

        let response = self.generate(&self.model, request).await?;
        let text = response
            .first_text()
            .ok_or_else(|| AiError::InvalidResponse("no suggestion generated".into()))?;

        serde_json::from_str(&extract_json(text))
            .map_err(|e| AiError::InvalidResponse(format!("suggestion JSON: {e}")))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn provider_name(&self) -> &'static str {
        "Gemini"
    }
}

fn post_generate(
    url: &str,
    request: &GenerateContentRequest,
    timeout: Duration,
) -> Result<GenerateContentResponse, AiError> {
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();

    let response = agent
        .post(url)
        .set("Content-Type", "application/json")
        .send_json(request)
        .map_err(map_ureq_error)?;

    response
        .into_json()
        .map_err(|e| AiError::InvalidResponse(format!("failed to parse response body: {e}")))
}

/// Map transport/status failures onto the retry taxonomy. Quota errors
/// arrive either as a bare 429 or buried in the error body.
fn map_ureq_error(err: ureq::Error) -> AiError {
    match err {
        ureq::Error::Status(429, response) => {
            let body = response.into_string().unwrap_or_default();
            AiError::RateLimited(format!("HTTP 429: {body}"))
        }
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            if body.contains("RESOURCE_EXHAUSTED") || body.contains("quota") {
                AiError::RateLimited(format!("HTTP {code}: {body}"))
            } else {
                AiError::Remote(format!("HTTP {code}: {body}"))
            }
        }
        ureq::Error::Transport(transport) => AiError::Remote(transport.to_string()),
    }
}

const CLASSIFY_PROMPT: &str = "Analyze this clothing item with the expertise of a fashion designer.\n\n\
    Identify the following:\n\
    1. Category: (Top, Bottom, Dress, Shoes, Outerwear, Accessory)\n\
    2. Color: Be specific (e.g., 'Crimson Red' instead of just 'Red', 'Sage Green' instead of 'Green').\n\
    3. Material: Estimate the fabric composition or texture specificities (e.g., 'Ribbed Cotton', 'Satin Silk', 'Distressed Denim', 'Faux Leather').\n\
    4. Style: List 2-3 key aesthetic keywords (e.g., 'Streetwear, Minimalist, Y2K', 'Business Casual, Preppy').\n\
    5. Description: A concise editorial description suitable for a catalog.\n\n\
    Return strictly JSON with the keys category, color, material, style, description.";

fn view_prompt(items: &[ClothingItem], viewpoint: Viewpoint) -> String {
    let item_descriptions = items
        .iter()
        .map(|i| format!("{} {} ({})", i.color, i.category, i.description))
        .collect::<Vec<_>>()
        .join(", ");
    let angle = viewpoint.prompt_label();

    format!(
        "Generate a realistic virtual try-on image.\n\
         The first image provided is the user (reference model).\n\
         The subsequent images are the ONLY clothing items to be worn.\n\n\
         Task: Generate a high-quality image of the user wearing these specific items from a {angle} angle.\n\n\
         Strict Rules:\n\
         1. Replace the user's original clothes with ONLY the items provided in the input images ({item_descriptions}).\n\
         2. Do NOT add any extra accessories, bags, hats, or jewelry that are not in the input.\n\
         3. Do NOT change the user's body shape or face.\n\
         4. The background should be neutral or identical to the original user photo.\n\
         5. Perspective: This must be a {angle} view."
    )
}

fn suggestion_prompt(profile: &Profile, inventory: &[ClothingItem], occasion: &str) -> String {
    let wardrobe_inventory: Vec<serde_json::Value> = inventory
        .iter()
        .map(|item| {
            serde_json::json!({
                "id": item.id,
                "category": item.category.as_str(),
                "color": item.color,
                "style": item.style,
                "material": item.material,
                "description": item.description,
            })
        })
        .collect();

    let style_preference = profile
        .style_preference
        .as_deref()
        .map(|p| format!("- Style Preference: {p}\n"))
        .unwrap_or_default();

    format!(
        "Act as a professional fashion stylist.\n\n\
         User Profile:\n\
         - Height: {height}cm\n\
         - Weight: {weight}kg\n\
         - Skin Tone: {skin_tone}\n\
         {style_preference}\n\
         Occasion/Context: {occasion}\n\n\
         Wardrobe Inventory:\n\
         {inventory}\n\n\
         Task:\n\
         Select the best outfit combination from the inventory for this user and occasion.\n\
         Explain why these items work together and how they complement the user's features (height, skin tone).\n\n\
         Return a JSON object with:\n\
         1. 'suggestion': A friendly paragraph explaining the choice.\n\
         2. 'recommendedItemIds': An array of the IDs of the selected items.",
        height = profile.height_cm,
        weight = profile.weight_kg,
        skin_tone = profile.skin_tone,
        inventory = serde_json::Value::Array(wardrobe_inventory),
    )
}

/// Extract JSON from a string that might contain markdown code blocks
fn extract_json(content: &str) -> String {
    let trimmed = content.trim();

    // Check for markdown code block
    if trimmed.starts_with("```") {
        // Find the end of the code block
        if let Some(start) = trimmed.find('\n') {
            let after_first_line = &trimmed[start + 1..];
            if let Some(end) = after_first_line.rfind("```") {
                return after_first_line[..end].trim().to_string();
            }
        }
    }

    // Already plain JSON
    trimmed.to_string()
}
