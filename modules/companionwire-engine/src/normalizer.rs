//! Signal normalization: one LLM call per pending signal, a declarative
//! validator over the response, and an accept/reject decision. The retry
//! protocol is deliberately narrow: rate limits back off and retry, a
//! validation failure gets exactly one stricter fallback attempt, and a bare
//! JSON parse error is terminal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use ai_client::util::{extract_json_object, truncate_to_char_boundary};
use ai_client::{AiError, ChatClient, ChatRequest, Message};
use companionwire_archive::og_image::fetch_og_image;
use companionwire_common::hashing::truncate_with_ellipsis;
use companionwire_common::{platform_slug, Category, EntityBundle, IngestStatus};
use companionwire_store::models::SignalNormalization;
use companionwire_store::Store;

use crate::prompts::{self, PROMPT_VERSION};

/// Items shorter than this never reach the LLM.
const MIN_CONTENT_CHARS: usize = 50;
/// Prompt content cap, bytes at a char boundary.
const MAX_PROMPT_CONTENT: usize = 30_000;
/// Raw LLM responses are bounded on the signal row.
const MAX_RAW_RESPONSE: usize = 20_000;
const MAX_SUMMARY: usize = 500;
const MAX_HEADLINE: usize = 120;

/// The validated shape of one LLM response.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub summary: String,
    pub suggested_headline: String,
    pub categories: Vec<Category>,
    pub entities: EntityBundle,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accepted(Draft),
    Rejected { reason: String, draft: Option<Draft> },
    Failed { reason: String },
}

#[derive(Debug)]
pub struct NormalizeOutcome {
    pub decision: Decision,
    /// Last raw response, kept for audit even on rejection.
    pub raw_response: Option<String>,
}

/// True when title + body together are too thin to be worth an LLM call.
pub fn is_too_short(title: &str, text: &str) -> bool {
    title.trim().chars().count() + text.trim().chars().count() < MIN_CONTENT_CHARS
}

/// Validate a parsed JSON value against the expected response shape.
/// Returns every problem found, not just the first, so the fallback prompt
/// and the failure reason can name them all.
pub fn validate_draft(value: &Value) -> Result<Draft, Vec<String>> {
    let mut errors = Vec::new();

    let obj = match value.as_object() {
        Some(o) => o,
        None => return Err(vec!["response is not a JSON object".to_string()]),
    };

    let summary = match obj.get("summary").and_then(|v| v.as_str()) {
        Some(s) if s.chars().count() <= MAX_SUMMARY => s.to_string(),
        Some(_) => {
            errors.push(format!("summary exceeds {MAX_SUMMARY} chars"));
            String::new()
        }
        None => {
            errors.push("summary missing or not a string".to_string());
            String::new()
        }
    };

    let suggested_headline = match obj.get("suggestedHeadline").and_then(|v| v.as_str()) {
        Some(s) if s.chars().count() <= MAX_HEADLINE => s.to_string(),
        Some(_) => {
            errors.push(format!("suggestedHeadline exceeds {MAX_HEADLINE} chars"));
            String::new()
        }
        None => {
            errors.push("suggestedHeadline missing or not a string".to_string());
            String::new()
        }
    };

    let mut categories = Vec::new();
    match obj.get("categories").and_then(|v| v.as_array()) {
        Some(list) if !list.is_empty() => {
            for item in list {
                match item.as_str().and_then(Category::parse) {
                    Some(c) => {
                        if !categories.contains(&c) {
                            categories.push(c);
                        }
                    }
                    None => errors.push(format!("unknown category: {item}")),
                }
            }
        }
        Some(_) => errors.push("categories must be non-empty".to_string()),
        None => errors.push("categories missing or not an array".to_string()),
    }

    let mut entities = EntityBundle::default();
    if let Some(ent) = obj.get("entities") {
        match ent.as_object() {
            Some(map) => {
                for (key, target) in [
                    ("platforms", &mut entities.platforms),
                    ("companies", &mut entities.companies),
                    ("people", &mut entities.people),
                    ("topics", &mut entities.topics),
                ] {
                    if let Some(list) = map.get(key) {
                        match list.as_array() {
                            Some(items) => {
                                for item in items {
                                    match item.as_str() {
                                        Some(s) if !s.trim().is_empty() => {
                                            target.push(s.trim().to_string())
                                        }
                                        Some(_) => {}
                                        None => errors
                                            .push(format!("entities.{key} contains a non-string")),
                                    }
                                }
                            }
                            None => errors.push(format!("entities.{key} is not an array")),
                        }
                    }
                }
            }
            None => errors.push("entities is not an object".to_string()),
        }
    }

    let confidence = match obj.get("confidence").and_then(|v| v.as_f64()) {
        Some(c) if (0.0..=1.0).contains(&c) => c,
        Some(c) => {
            errors.push(format!("confidence {c} outside [0,1]"));
            0.0
        }
        None => {
            errors.push("confidence missing or not a number".to_string());
            0.0
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Draft {
        summary,
        suggested_headline,
        categories,
        entities,
        confidence,
    })
}

pub struct Normalizer {
    chat: Arc<dyn ChatClient>,
    min_confidence: f64,
    max_attempts: u32,
}

impl Normalizer {
    pub fn new(chat: Arc<dyn ChatClient>, min_confidence: f64) -> Self {
        Self {
            chat,
            min_confidence,
            max_attempts: 3,
        }
    }

    pub fn provider(&self) -> &'static str {
        self.chat.provider()
    }

    pub fn model(&self) -> String {
        self.chat.model().to_string()
    }

    /// Run the LLM protocol for one item. No persistence here; the caller
    /// owns the signal row.
    pub async fn normalize_content(
        &self,
        title: &str,
        source_name: &str,
        url: &str,
        published: &str,
        content: &str,
    ) -> NormalizeOutcome {
        let content = truncate_to_char_boundary(content, MAX_PROMPT_CONTENT);
        let base_prompt = prompts::user_prompt(title, source_name, url, published, content);

        let mut used_fallback = false;
        let mut attempt = 0u32;
        let mut last_raw: Option<String> = None;

        loop {
            attempt += 1;
            if attempt > self.max_attempts {
                return NormalizeOutcome {
                    decision: Decision::Failed {
                        reason: format!("gave up after {} attempts", self.max_attempts),
                    },
                    raw_response: last_raw,
                };
            }

            let user = if used_fallback {
                format!("{base_prompt}{}", prompts::FALLBACK_SUFFIX)
            } else {
                base_prompt.clone()
            };
            let request = ChatRequest::new(vec![
                Message::system(prompts::SYSTEM_PROMPT),
                Message::user(user),
            ])
            .with_temperature(0.0);

            let text = match self.chat.chat(&request).await {
                Ok(t) => t,
                Err(AiError::RateLimited { retry_after_secs }) => {
                    if attempt >= self.max_attempts {
                        return NormalizeOutcome {
                            decision: Decision::Failed {
                                reason: "rate limited, retries exhausted".to_string(),
                            },
                            raw_response: last_raw,
                        };
                    }
                    // Server-advised wait, linear backoff when absent.
                    let wait = retry_after_secs.unwrap_or(attempt as u64 * 2);
                    warn!(attempt, wait, "LLM rate limited, backing off");
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    continue;
                }
                Err(e) => {
                    return NormalizeOutcome {
                        decision: Decision::Failed {
                            reason: format!("llm request failed: {e}"),
                        },
                        raw_response: last_raw,
                    };
                }
            };

            last_raw = Some(text.clone());

            let json_str = extract_json_object(&text);
            let value: Value = match serde_json::from_str(json_str) {
                Ok(v) => v,
                // Unparseable JSON is terminal: a second identical prompt
                // rarely fixes it and the token spend is not free.
                Err(e) => {
                    return NormalizeOutcome {
                        decision: Decision::Failed {
                            reason: format!("invalid JSON in response: {e}"),
                        },
                        raw_response: last_raw,
                    };
                }
            };

            match validate_draft(&value) {
                Ok(draft) => {
                    let decision = if draft.confidence < self.min_confidence {
                        Decision::Rejected {
                            reason: format!(
                                "confidence {:.2} below threshold {:.2}",
                                draft.confidence, self.min_confidence
                            ),
                            draft: Some(draft),
                        }
                    } else {
                        Decision::Accepted(draft)
                    };
                    return NormalizeOutcome {
                        decision,
                        raw_response: last_raw,
                    };
                }
                Err(errors) => {
                    if !used_fallback && attempt < self.max_attempts {
                        warn!(attempt, errors = errors.join("; "), "validation failed, retrying with fallback prompt");
                        used_fallback = true;
                        continue;
                    }
                    return NormalizeOutcome {
                        decision: Decision::Failed {
                            reason: format!("validation failed: {}", errors.join("; ")),
                        },
                        raw_response: last_raw,
                    };
                }
            }
        }
    }

    /// Normalize one pending signal end to end: load, short-text check, LLM
    /// protocol, decision persistence, platform links, OG image probe.
    pub async fn normalize_signal(
        &self,
        store: &Store,
        signal_id: Uuid,
    ) -> anyhow::Result<IngestStatus> {
        let signal = store
            .signal_by_id(signal_id)
            .await?
            .context("signal not found")?;
        let raw = store
            .raw_signal_by_id(signal.raw_signal_id)
            .await?
            .context("raw signal missing")?;

        let text = raw.raw_text.clone().unwrap_or_default();
        if is_too_short(&signal.title, &text) {
            store
                .apply_normalization(
                    signal_id,
                    &SignalNormalization {
                        status: IngestStatus::Rejected.as_str().to_string(),
                        reason: Some("text too short".to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(IngestStatus::Rejected);
        }

        let published = signal
            .published_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());
        let outcome = self
            .normalize_content(
                &signal.title,
                &raw.source_name,
                &signal.canonical_url,
                &published,
                &text,
            )
            .await;

        let raw_response = outcome
            .raw_response
            .map(|r| truncate_with_ellipsis(&r, MAX_RAW_RESPONSE));

        match outcome.decision {
            Decision::Failed { reason } => {
                warn!(signal = %signal_id, reason, "normalization failed");
                store
                    .apply_normalization(
                        signal_id,
                        &SignalNormalization {
                            status: IngestStatus::Failed.as_str().to_string(),
                            reason: Some(reason),
                            llm_provider: Some(self.provider().to_string()),
                            llm_model: Some(self.model()),
                            prompt_version: Some(PROMPT_VERSION.to_string()),
                            llm_raw_response: raw_response,
                            ..Default::default()
                        },
                    )
                    .await?;
                Ok(IngestStatus::Failed)
            }
            Decision::Rejected { reason, draft } => {
                info!(signal = %signal_id, reason, "signal rejected");
                let mut update = SignalNormalization {
                    status: IngestStatus::Rejected.as_str().to_string(),
                    reason: Some(reason),
                    llm_provider: Some(self.provider().to_string()),
                    llm_model: Some(self.model()),
                    prompt_version: Some(PROMPT_VERSION.to_string()),
                    llm_raw_response: raw_response,
                    ..Default::default()
                };
                if let Some(draft) = draft {
                    update.confidence = Some(draft.confidence);
                    update.summary = Some(draft.summary);
                    update.suggested_headline = Some(draft.suggested_headline);
                }
                store.apply_normalization(signal_id, &update).await?;
                Ok(IngestStatus::Rejected)
            }
            Decision::Accepted(draft) => {
                let slugs = dedup_slugs(&draft.entities.platforms);
                let known = store.known_platform_slugs(&slugs).await?;
                let image_url = fetch_og_image(&signal.canonical_url).await;

                store
                    .apply_normalization(
                        signal_id,
                        &SignalNormalization {
                            status: IngestStatus::Accepted.as_str().to_string(),
                            reason: None,
                            summary: Some(truncate_with_ellipsis(&draft.summary, 2000)),
                            suggested_headline: Some(truncate_with_ellipsis(
                                &draft.suggested_headline,
                                200,
                            )),
                            categories: draft
                                .categories
                                .iter()
                                .map(|c| c.as_str().to_string())
                                .collect(),
                            entity_platforms: slugs,
                            entity_companies: draft.entities.companies.clone(),
                            entity_people: draft.entities.people.clone(),
                            entity_topics: draft.entities.topics.clone(),
                            confidence: Some(draft.confidence),
                            llm_provider: Some(self.provider().to_string()),
                            llm_model: Some(self.model()),
                            prompt_version: Some(PROMPT_VERSION.to_string()),
                            llm_raw_response: raw_response,
                            image_url,
                        },
                    )
                    .await?;
                store.link_signal_platforms(signal_id, &known).await?;

                info!(signal = %signal_id, confidence = draft.confidence, "signal accepted");
                Ok(IngestStatus::Accepted)
            }
        }
    }
}

/// Slugify and dedup, preserving first-seen order.
fn dedup_slugs(platforms: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for p in platforms {
        let slug = platform_slug(p);
        if !slug.is_empty() && !out.contains(&slug) {
            out.push(slug);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // --- short-text gate ---

    #[test]
    fn text_of_49_chars_is_too_short() {
        let text = "a".repeat(49);
        assert!(is_too_short("", &text));
    }

    #[test]
    fn text_of_50_chars_is_long_enough() {
        let text = "a".repeat(50);
        assert!(!is_too_short("", &text));
    }

    #[test]
    fn title_counts_toward_length() {
        assert!(!is_too_short("Replika launches voice calls for subscribers", "today"));
    }

    // --- validation ---

    fn valid_value() -> Value {
        json!({
            "summary": "Replika rolled out voice calls to paying users.",
            "suggestedHeadline": "Replika adds voice calls",
            "categories": ["PRODUCT_UPDATE"],
            "entities": {
                "platforms": ["Replika"],
                "companies": ["Luka"],
                "people": [],
                "topics": ["voice"]
            },
            "confidence": 0.9
        })
    }

    #[test]
    fn valid_response_parses() {
        let draft = validate_draft(&valid_value()).unwrap();
        assert_eq!(draft.categories, vec![Category::ProductUpdate]);
        assert_eq!(draft.entities.platforms, vec!["Replika"]);
        assert_eq!(draft.confidence, 0.9);
    }

    #[test]
    fn missing_entities_default_empty() {
        let mut v = valid_value();
        v.as_object_mut().unwrap().remove("entities");
        let draft = validate_draft(&v).unwrap();
        assert!(draft.entities.platforms.is_empty());
        assert!(draft.entities.topics.is_empty());
    }

    #[test]
    fn empty_categories_rejected() {
        let mut v = valid_value();
        v["categories"] = json!([]);
        let errors = validate_draft(&v).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("non-empty")));
    }

    #[test]
    fn unknown_category_rejected() {
        let mut v = valid_value();
        v["categories"] = json!(["PRODUCT_UPDATE", "SPORTS"]);
        let errors = validate_draft(&v).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("unknown category")));
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let mut v = valid_value();
        v["confidence"] = json!(1.5);
        assert!(validate_draft(&v).is_err());
        v["confidence"] = json!(-0.1);
        assert!(validate_draft(&v).is_err());
    }

    #[test]
    fn overlong_summary_rejected() {
        let mut v = valid_value();
        v["summary"] = json!("x".repeat(501));
        let errors = validate_draft(&v).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("summary exceeds")));
    }

    #[test]
    fn overlong_headline_rejected() {
        let mut v = valid_value();
        v["suggestedHeadline"] = json!("x".repeat(121));
        assert!(validate_draft(&v).is_err());
    }

    #[test]
    fn non_object_rejected() {
        assert!(validate_draft(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn multiple_errors_all_reported() {
        let v = json!({"summary": 7, "categories": []});
        let errors = validate_draft(&v).unwrap_err();
        assert!(errors.len() >= 3, "summary, headline, categories, confidence: {errors:?}");
    }

    // --- slug handling ---

    #[test]
    fn slugs_deduped_in_order() {
        let slugs = dedup_slugs(&[
            "Character AI".to_string(),
            "Replika".to_string(),
            "character ai".to_string(),
        ]);
        assert_eq!(slugs, vec!["character-ai", "replika"]);
    }
}
