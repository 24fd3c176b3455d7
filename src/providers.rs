//! Feedback / object providers (the generative service) and their fallbacks.
//!
//! The crate does not talk HTTP itself: the page hands in JS functions returning
//! Promises, wrapped here as [`JsFeedbackProvider`] and [`JsObjectProvider`].
//! Whatever the provider does, the animation loop never waits on it.

use std::collections::HashSet;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use crate::catalog::MindfulObject;
use crate::error::ProviderError;

const EMPTY_FEEDBACK: &str = "Breathe and continue.";

#[allow(async_fn_in_trait)]
pub trait FeedbackProvider {
    /// Short encouraging line for a completed level. `accuracy` is in [0, 1].
    async fn zen_feedback(&self, accuracy: f64, level: u32) -> Result<String, ProviderError>;
}

#[allow(async_fn_in_trait)]
pub trait ObjectProvider {
    /// A fresh collectible whose emoji is not in `excluded`.
    async fn generate_object(
        &self,
        excluded: &HashSet<String>,
    ) -> Result<MindfulObject, ProviderError>;
}

/// Line used when the provider fails for a non-quota reason.
pub fn canned_feedback(accuracy: f64) -> &'static str {
    if accuracy > 0.8 {
        "Perfectly centered."
    } else {
        "Return to the breath."
    }
}

/// Ask for feedback, absorbing generic failures. Only quota errors escape so the
/// caller can show the credential prompt.
pub async fn fetch_feedback<P: FeedbackProvider>(
    provider: &P,
    accuracy: f64,
    level: u32,
) -> Result<String, ProviderError> {
    match provider.zen_feedback(accuracy, level).await {
        Ok(text) if text.trim().is_empty() => Ok(EMPTY_FEEDBACK.to_string()),
        Ok(text) => Ok(text),
        Err(ProviderError::QuotaExceeded) => Err(ProviderError::QuotaExceeded),
        Err(_) => Ok(canned_feedback(accuracy).to_string()),
    }
}

/// Ask for the next object and reject anything unusable (blank fields or an
/// emoji the player has already seen).
pub async fn fetch_object<P: ObjectProvider>(
    provider: &P,
    excluded: &HashSet<String>,
) -> Result<MindfulObject, ProviderError> {
    let obj = provider.generate_object(excluded).await?;
    validate_object(obj, excluded)
}

/// Parse the provider's JSON payload (`{name, emoji, color, mantra}`).
pub fn parse_object(json: &str) -> Result<MindfulObject, ProviderError> {
    let obj: MindfulObject = serde_json::from_str(json)?;
    Ok(obj)
}

fn validate_object(
    obj: MindfulObject,
    excluded: &HashSet<String>,
) -> Result<MindfulObject, ProviderError> {
    if obj.emoji.trim().is_empty() || obj.name.trim().is_empty() {
        return Err(ProviderError::Failed("object is missing emoji or name".into()));
    }
    if excluded.contains(&obj.emoji) {
        return Err(ProviderError::Failed(format!(
            "object reuses seen emoji {}",
            obj.emoji
        )));
    }
    Ok(obj)
}

// --- JS-backed providers ----------------------------------------------------

/// `(accuracy, level) => Promise<string>`
pub struct JsFeedbackProvider {
    func: js_sys::Function,
}

impl JsFeedbackProvider {
    pub fn new(func: js_sys::Function) -> Self {
        Self { func }
    }
}

impl FeedbackProvider for JsFeedbackProvider {
    async fn zen_feedback(&self, accuracy: f64, level: u32) -> Result<String, ProviderError> {
        let value = call_promise(
            &self.func,
            &JsValue::from_f64(accuracy),
            &JsValue::from(level),
        )
        .await?;
        value
            .as_string()
            .ok_or_else(|| ProviderError::Failed("feedback is not a string".into()))
    }
}

/// `(excludedEmojis: string[]) => Promise<object | string>`; a string result is
/// treated as JSON text.
pub struct JsObjectProvider {
    func: js_sys::Function,
}

impl JsObjectProvider {
    pub fn new(func: js_sys::Function) -> Self {
        Self { func }
    }
}

impl ObjectProvider for JsObjectProvider {
    async fn generate_object(
        &self,
        excluded: &HashSet<String>,
    ) -> Result<MindfulObject, ProviderError> {
        let list = js_sys::Array::new();
        for emoji in excluded {
            list.push(&JsValue::from_str(emoji));
        }
        let value = call_promise(&self.func, &list.into(), &JsValue::UNDEFINED).await?;
        let json = match value.as_string() {
            Some(text) => text,
            None => js_sys::JSON::stringify(&value)
                .map_err(|e| ProviderError::Failed(js_error_message(&e)))?
                .into(),
        };
        parse_object(&json)
    }
}

async fn call_promise(
    func: &js_sys::Function,
    a: &JsValue,
    b: &JsValue,
) -> Result<JsValue, ProviderError> {
    let ret = func
        .call2(&JsValue::NULL, a, b)
        .map_err(|e| ProviderError::classify(js_error_message(&e)))?;
    let promise = js_sys::Promise::resolve(&ret);
    JsFuture::from(promise)
        .await
        .map_err(|e| ProviderError::classify(js_error_message(&e)))
}

fn js_error_message(err: &JsValue) -> String {
    if let Some(e) = err.dyn_ref::<js_sys::Error>() {
        return String::from(e.message());
    }
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}
