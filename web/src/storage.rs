use anyhow::{anyhow, Context, Result};
use pastegate_common::{Store, StoreError};
use wasm_bindgen::JsValue;
use web_sys::Storage;

use crate::window;

/// A [`Store`] backed by one of the browser's web storage areas.
pub struct WebStorage(Storage);

impl WebStorage {
    /// Storage that outlives the tab.
    pub fn local() -> Result<Self> {
        window()
            .local_storage()
            .map_err(js_error)?
            .map(Self)
            .context("Local storage is unavailable")
    }

    /// Storage scoped to the current tab.
    pub fn session() -> Result<Self> {
        window()
            .session_storage()
            .map_err(js_error)?
            .map(Self)
            .context("Session storage is unavailable")
    }
}

impl Store for WebStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get_item(key).ok().flatten()
    }

    // Browsers throw here when the quota is exceeded or storage is disabled.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0
            .set_item(key, value)
            .map_err(|e| StoreError::Rejected(describe(&e)))
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.0
            .remove_item(key)
            .map_err(|e| StoreError::Rejected(describe(&e)))
    }
}

pub fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

#[allow(clippy::needless_pass_by_value)]
pub fn js_error(value: JsValue) -> anyhow::Error {
    anyhow!(describe(&value))
}
