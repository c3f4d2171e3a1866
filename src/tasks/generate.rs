use base64::Engine;
use rand::Rng;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::{GenerationSettings, ProviderKind};
use crate::error::{EditorError, MissingField, Result};
use crate::tasks::loader::ImageSource;

const MAX_DIAGNOSTIC_BODY: usize = 512;
const SEED_RANGE: u64 = 1_000_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

/// Client for the configured image-generation provider and the prompt translator.
#[derive(Debug, Clone)]
pub struct Generator {
    client: reqwest::Client,
    settings: GenerationSettings,
}

impl Generator {
    pub fn new(settings: GenerationSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn provider(&self) -> ProviderKind {
        self.settings.provider
    }

    pub fn translation_enabled(&self) -> bool {
        self.settings.translation.enabled
    }

    /// Produces the source of a generated image. Imagen answers with the bytes
    /// directly; Pollinations answers with a URL the loader fetches.
    pub async fn generate(
        &self,
        prompt: &str,
        api_key: Option<&str>,
        seed: Option<u64>,
    ) -> Result<ImageSource> {
        if prompt.trim().is_empty() {
            return Err(EditorError::MissingInput(MissingField::Prompt));
        }
        match self.settings.provider {
            ProviderKind::Imagen => {
                let key = api_key
                    .filter(|k| !k.trim().is_empty())
                    .ok_or(EditorError::MissingInput(MissingField::ApiKey))?;
                self.imagen(prompt, key).await
            }
            ProviderKind::Pollinations => {
                let seed = seed.unwrap_or_else(|| rand::rng().random_range(0..SEED_RANGE));
                Ok(ImageSource::Url(self.pollinations_url(prompt, seed)?))
            }
        }
    }

    async fn imagen(&self, prompt: &str, key: &str) -> Result<ImageSource> {
        let imagen = &self.settings.imagen;
        let mut url = endpoint_url(&imagen.endpoint, &format!("models/{}:predict", imagen.model))?;
        url.query_pairs_mut().append_pair("key", key);
        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": imagen.sample_count,
                "aspectRatio": imagen.aspect_ratio,
            }
        });
        debug!(model = %imagen.model, "requesting imagen prediction");
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(map_transport)?;
        if !status.is_success() {
            return Err(rejection(status.as_u16(), &text));
        }
        let parsed: PredictResponse = serde_json::from_str(&text).map_err(|err| {
            warn!(error = %err, "unparseable prediction response");
            rejection(status.as_u16(), &text)
        })?;
        let encoded = parsed
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| EditorError::ProviderRejection {
                status: status.as_u16(),
                body: format!("empty payload: {}", truncate(&text)),
            })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|err| EditorError::InvalidAsset(format!("bad base64 payload: {err}")))?;
        Ok(ImageSource::Bytes(bytes))
    }

    /// `GET {endpoint}/{url-encoded prompt}?width=W&height=H&seed=S&nologo=true`
    pub fn pollinations_url(&self, prompt: &str, seed: u64) -> Result<Url> {
        let cfg = &self.settings.pollinations;
        let mut url = Url::parse(&cfg.endpoint)
            .map_err(|err| EditorError::InvalidEndpoint(format!("{}: {err}", cfg.endpoint)))?;
        url.path_segments_mut()
            .map_err(|_| EditorError::InvalidEndpoint(cfg.endpoint.clone()))?
            .pop_if_empty()
            .push(prompt.trim());
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("width", &cfg.width.to_string())
                .append_pair("height", &cfg.height.to_string())
                .append_pair("seed", &seed.to_string());
            if cfg.nologo {
                query.append_pair("nologo", "true");
            }
        }
        Ok(url)
    }

    /// Rewrites a prompt into English with the text model.
    pub async fn translate(&self, prompt: &str, key: &str) -> Result<String> {
        let tr = &self.settings.translation;
        let mut url = endpoint_url(&tr.endpoint, &format!("models/{}:generateContent", tr.model))?;
        url.query_pairs_mut().append_pair("key", key);
        let instruction = format!(
            "Translate the following text into a concise English prompt for an image \
             generation model. Reply with the prompt only.\n\n{prompt}"
        );
        let body = json!({ "contents": [{ "parts": [{ "text": instruction }] }] });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(map_transport)?;
        if !status.is_success() {
            return Err(rejection(status.as_u16(), &text));
        }
        let parsed: GenerateContentResponse =
            serde_json::from_str(&text).map_err(|_| rejection(status.as_u16(), &text))?;
        parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EditorError::ProviderRejection {
                status: status.as_u16(),
                body: "empty translation".to_string(),
            })
    }
}

/// True when the prompt carries letters outside the Latin script blocks.
pub fn needs_translation(prompt: &str) -> bool {
    prompt.chars().any(|c| c.is_alphabetic() && !is_latin(c))
}

fn is_latin(c: char) -> bool {
    c <= '\u{024F}' || ('\u{1E00}'..='\u{1EFF}').contains(&c)
}

fn endpoint_url(base: &str, path: &str) -> Result<Url> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path);
    Url::parse(&raw).map_err(|err| EditorError::InvalidEndpoint(format!("{raw}: {err}")))
}

fn map_transport(err: reqwest::Error) -> EditorError {
    if err.is_timeout() {
        EditorError::Timeout
    } else {
        EditorError::Network(err)
    }
}

fn rejection(status: u16, body: &str) -> EditorError {
    EditorError::ProviderRejection {
        status,
        body: truncate(body),
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_DIAGNOSTIC_BODY).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollinationsSettings;

    fn generator(provider: ProviderKind) -> Generator {
        Generator::new(GenerationSettings {
            provider,
            pollinations: PollinationsSettings {
                endpoint: "https://img.example/prompt".to_string(),
                ..PollinationsSettings::default()
            },
            ..GenerationSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn pollinations_url_encodes_prompt_and_seed() {
        let url = generator(ProviderKind::Pollinations)
            .pollinations_url("a cat & a dog", 42)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://img.example/prompt/a%20cat%20&%20a%20dog?width=1080&height=1080&seed=42&nologo=true"
        );
    }

    #[test]
    fn detects_non_latin_prompts() {
        assert!(!needs_translation("A café at sunset"));
        assert!(!needs_translation("123 !!"));
        assert!(needs_translation("夕焼けのカフェ"));
        assert!(needs_translation("закат"));
    }

    #[tokio::test]
    async fn imagen_refuses_without_key_or_prompt() {
        let g = generator(ProviderKind::Imagen);
        assert!(g.provider().requires_key());
        let err = g.generate("sunset", None, None).await.unwrap_err();
        assert!(matches!(err, EditorError::MissingInput(MissingField::ApiKey)));
        let err = g.generate("   ", Some("k"), None).await.unwrap_err();
        assert!(matches!(err, EditorError::MissingInput(MissingField::Prompt)));
    }

    #[tokio::test]
    async fn pollinations_needs_no_key() {
        let g = generator(ProviderKind::Pollinations);
        assert!(!g.provider().requires_key());
        let source = g.generate("sunset", None, Some(7)).await.unwrap();
        match source {
            ImageSource::Url(url) => assert!(url.as_str().contains("seed=7")),
            other => panic!("unexpected source {other:?}"),
        }
    }
}
