//! Browser implementations of the platform seams.
//!
//! Every call goes through `js_sys::Reflect` on the live globals so the
//! bindings keep working on browsers that lack an API: the flow asks
//! [`PlatformAuthenticator::has_credential_api`] before anything else.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect, Uint8Array};
use rollcall_core::ceremony::{
    Assertion, CredentialAssertionRequest, CredentialCreationRequest, NewCredential,
};
use rollcall_core::{
    Camera, CameraConstraints, CameraError, CameraStream, CeremonyError, KeyValueStore, Pause,
    StoreError, Timer,
};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{MediaStream, MediaStreamTrack};

fn get(target: &JsValue, key: &str) -> Result<JsValue, JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
}

fn set(target: &JsValue, key: &str, value: impl Into<JsValue>) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), &value.into()).map(|_| ())
}

/// Serialize through JSON into a plain JS object.
pub(crate) fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&json)
}

fn buffer_bytes(value: &JsValue) -> Vec<u8> {
    if value.is_undefined() || value.is_null() {
        Vec::new()
    } else {
        Uint8Array::new(value).to_vec()
    }
}

/// `(name, message)` of a thrown DOMException or Error.
fn exception_parts(err: &JsValue) -> (String, String) {
    let field = |key| get(err, key).ok().and_then(|v| v.as_string()).unwrap_or_default();
    (field("name"), field("message"))
}

fn ceremony_error(err: JsValue) -> CeremonyError {
    let (name, message) = exception_parts(&err);
    CeremonyError::from_dom_name(&name, &message)
}

/// Classify a `getUserMedia` rejection by DOMException name.
pub(crate) fn camera_error_from_name(name: &str, message: &str) -> CameraError {
    match name {
        "NotAllowedError" | "SecurityError" => CameraError::PermissionDenied,
        "NotFoundError" | "OverconstrainedError" => CameraError::NotFound,
        _ => CameraError::Other(format!("{name}: {message}")),
    }
}

/// `localStorage` of the current origin.
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<Self, StoreError> {
        let window =
            web_sys::window().ok_or_else(|| StoreError::Unavailable("no window".into()))?;
        let storage = window
            .local_storage()
            .map_err(|_| StoreError::Unavailable("localStorage access denied".into()))?
            .ok_or_else(|| StoreError::Unavailable("localStorage missing".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.storage
            .get_item(key)
            .map_err(|e| StoreError::Unavailable(exception_parts(&e).1))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Throws QuotaExceededError when storage is full
        self.storage
            .set_item(key, value)
            .map_err(|e| StoreError::Write(exception_parts(&e).1))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.storage
            .remove_item(key)
            .map_err(|e| StoreError::Write(exception_parts(&e).1))
    }
}

/// `navigator.credentials` with the global `PublicKeyCredential`.
pub struct BrowserAuthenticator {
    global: JsValue,
    navigator: JsValue,
}

impl BrowserAuthenticator {
    pub fn new() -> Self {
        let global: JsValue = js_sys::global().into();
        let navigator = get(&global, "navigator").unwrap_or(JsValue::UNDEFINED);
        Self { global, navigator }
    }

    fn credentials(&self) -> Result<JsValue, CeremonyError> {
        let credentials = get(&self.navigator, "credentials").map_err(ceremony_error)?;
        if credentials.is_undefined() || credentials.is_null() {
            return Err(CeremonyError::NotSupported);
        }
        Ok(credentials)
    }

    async fn call_credentials(&self, method: &str, options: &Object) -> Result<JsValue, CeremonyError> {
        let credentials = self.credentials()?;
        let function: Function = get(&credentials, method)
            .and_then(|f| f.dyn_into())
            .map_err(|_| CeremonyError::NotSupported)?;
        let promise: Promise = function
            .call1(&credentials, options)
            .and_then(|p| p.dyn_into())
            .map_err(ceremony_error)?;
        JsFuture::from(promise).await.map_err(ceremony_error)
    }
}

impl Default for BrowserAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl rollcall_core::PlatformAuthenticator for BrowserAuthenticator {
    fn has_credential_api(&self) -> bool {
        let has = |target: &JsValue, key: &str| {
            Reflect::has(target, &JsValue::from_str(key)).unwrap_or(false)
        };
        has(&self.global, "PublicKeyCredential") && has(&self.navigator, "credentials")
    }

    async fn platform_authenticator_available(&self) -> Result<bool, CeremonyError> {
        let class = get(&self.global, "PublicKeyCredential").map_err(ceremony_error)?;
        let probe: Function = get(&class, "isUserVerifyingPlatformAuthenticatorAvailable")
            .and_then(|f| f.dyn_into())
            .map_err(|_| CeremonyError::NotSupported)?;
        let promise: Promise = probe
            .call0(&class)
            .and_then(|p| p.dyn_into())
            .map_err(ceremony_error)?;
        let available = JsFuture::from(promise).await.map_err(ceremony_error)?;
        Ok(available.as_bool().unwrap_or(false))
    }

    async fn create(
        &self,
        request: &CredentialCreationRequest,
    ) -> Result<NewCredential, CeremonyError> {
        // JSON carries binary fields as base64url; the API wants buffers.
        let public_key = to_js(request).map_err(ceremony_error)?;
        set(&public_key, "challenge", Uint8Array::from(request.challenge.as_bytes()))
            .map_err(ceremony_error)?;
        let user = get(&public_key, "user").map_err(ceremony_error)?;
        set(&user, "id", Uint8Array::from(request.user.id.as_slice())).map_err(ceremony_error)?;

        let options = Object::new();
        set(&options, "publicKey", public_key).map_err(ceremony_error)?;
        let credential = self.call_credentials("create", &options).await?;
        if credential.is_null() || credential.is_undefined() {
            return Err(CeremonyError::Other {
                name: "UnknownError".into(),
                message: "no credential returned".into(),
            });
        }

        let raw_id = get(&credential, "rawId").map_err(ceremony_error)?;
        Ok(NewCredential {
            raw_id: buffer_bytes(&raw_id),
        })
    }

    async fn get(
        &self,
        request: &CredentialAssertionRequest,
    ) -> Result<Option<Assertion>, CeremonyError> {
        let public_key = to_js(request).map_err(ceremony_error)?;
        set(&public_key, "challenge", Uint8Array::from(request.challenge.as_bytes()))
            .map_err(ceremony_error)?;
        let allowed = Array::from(&get(&public_key, "allowCredentials").map_err(ceremony_error)?);
        for (index, descriptor) in request.allow_credentials.iter().enumerate() {
            set(
                &allowed.get(index as u32),
                "id",
                Uint8Array::from(descriptor.id.as_slice()),
            )
            .map_err(ceremony_error)?;
        }

        let options = Object::new();
        set(&options, "publicKey", public_key).map_err(ceremony_error)?;
        let credential = self.call_credentials("get", &options).await?;
        if credential.is_null() || credential.is_undefined() {
            return Ok(None);
        }

        let response = get(&credential, "response").map_err(ceremony_error)?;
        let field = |key| get(&response, key).map(|v| buffer_bytes(&v)).map_err(ceremony_error);
        Ok(Some(Assertion {
            raw_id: buffer_bytes(&get(&credential, "rawId").map_err(ceremony_error)?),
            authenticator_data: field("authenticatorData")?,
            client_data_json: field("clientDataJSON")?,
            signature: field("signature")?,
        }))
    }
}

/// Shared handle on the stream currently feeding the preview element.
pub type PreviewHandle = Rc<RefCell<Option<MediaStream>>>;

/// `navigator.mediaDevices.getUserMedia`.
pub struct BrowserCamera {
    preview: PreviewHandle,
}

impl BrowserCamera {
    pub fn new(preview: PreviewHandle) -> Self {
        Self { preview }
    }

    fn constraints(constraints: &CameraConstraints) -> Result<Object, JsValue> {
        let ideal = |value: u32| -> Result<Object, JsValue> {
            let object = Object::new();
            set(&object, "ideal", value)?;
            Ok(object)
        };
        let video = Object::new();
        set(&video, "facingMode", to_js(&constraints.facing)?)?;
        set(&video, "width", ideal(constraints.ideal_width)?)?;
        set(&video, "height", ideal(constraints.ideal_height)?)?;

        let options = Object::new();
        set(&options, "video", video)?;
        set(&options, "audio", constraints.audio)?;
        Ok(options)
    }
}

#[async_trait(?Send)]
impl Camera for BrowserCamera {
    async fn acquire(
        &self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraStream>, CameraError> {
        let media_error = |err: JsValue| {
            let (name, message) = exception_parts(&err);
            camera_error_from_name(&name, &message)
        };
        let navigator = get(&js_sys::global(), "navigator").map_err(media_error)?;
        let devices = get(&navigator, "mediaDevices").map_err(media_error)?;
        if devices.is_undefined() || devices.is_null() {
            return Err(CameraError::NotFound);
        }
        let get_user_media: Function = get(&devices, "getUserMedia")
            .and_then(|f| f.dyn_into())
            .map_err(|_| CameraError::NotFound)?;

        let options = Self::constraints(constraints).map_err(media_error)?;
        let promise: Promise = get_user_media
            .call1(&devices, &options)
            .and_then(|p| p.dyn_into())
            .map_err(media_error)?;
        let stream: MediaStream = JsFuture::from(promise)
            .await
            .map_err(media_error)?
            .dyn_into()
            .map_err(|_| CameraError::Other("getUserMedia returned no stream".into()))?;

        *self.preview.borrow_mut() = Some(stream.clone());
        Ok(Box::new(BrowserStream {
            stream,
            preview: self.preview.clone(),
        }))
    }
}

pub struct BrowserStream {
    stream: MediaStream,
    preview: PreviewHandle,
}

impl CameraStream for BrowserStream {
    fn stop(&mut self) {
        for track in self.stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
        self.preview.borrow_mut().take();
    }

    fn is_active(&self) -> bool {
        self.stream.active()
    }
}

/// `setTimeout` as an awaitable pause.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowTimer;

pub(crate) fn timeout_ms(duration: Duration) -> i32 {
    duration.as_millis().min(i32::MAX as u128) as i32
}

#[async_trait(?Send)]
impl Timer for WindowTimer {
    async fn pause(&self, _pause: Pause, duration: Duration) {
        let ms = timeout_ms(duration);
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window().map(|window| {
                window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            });
            if !matches!(scheduled, Some(Ok(_))) {
                let _ = resolve.call0(&JsValue::UNDEFINED);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_names() {
        assert_eq!(
            camera_error_from_name("NotAllowedError", "denied"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            camera_error_from_name("OverconstrainedError", ""),
            CameraError::NotFound
        );
        assert!(matches!(
            camera_error_from_name("NotReadableError", "in use"),
            CameraError::Other(_)
        ));
    }

    #[test]
    fn test_timeout_is_clamped() {
        assert_eq!(timeout_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(timeout_ms(Duration::from_secs(u64::MAX)), i32::MAX);
    }
}
