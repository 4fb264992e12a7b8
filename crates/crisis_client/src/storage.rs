use crisis_sync::KeyValueStore;
use crisis_sync::error::{ClientError, Result};
use wasm_bindgen::JsValue;

/// [`KeyValueStore`] over `window.localStorage`.
///
/// Every call looks the storage object up again, so the handle itself holds
/// nothing and is trivially `Send + Sync`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorage;

fn js_error(e: JsValue) -> ClientError {
    ClientError::Storage(format!("{e:?}"))
}

fn storage() -> Result<web_sys::Storage> {
    let window = web_sys::window().ok_or_else(|| ClientError::Storage("no window".into()))?;
    window
        .local_storage()
        .map_err(js_error)?
        .ok_or_else(|| ClientError::Storage("localStorage unavailable".into()))
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        storage()?.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> Result<()> {
        storage()?.remove_item(key).map_err(js_error)
    }
}
