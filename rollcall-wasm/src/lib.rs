//! WebAssembly bindings for the Rollcall identity-verification modal.
//!
//! The page constructs one [`BiometricModal`] per check-in, wires its
//! callbacks to routing, and drives it from buttons. Everything runs on the
//! page's event loop; asynchronous methods return promises.
//!
//! ```js
//! const modal = new BiometricModal(
//!   (verdict) => markAttendance(verdict),
//!   () => hideModal(),
//!   (from, to) => render(to),
//! );
//! if (await modal.check_capability() === "available") await modal.verify();
//! ```

mod browser;

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Promise};
use rollcall_core::{
    Capability, FlowConfig, FlowError, FlowObserver, FlowState, IdentityVerificationFlow,
    PageContext, Verdict,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::MediaStream;

use browser::{
    to_js, BrowserAuthenticator, BrowserCamera, LocalStorageStore, PreviewHandle, WindowTimer,
};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Stable identifier JS code can branch on (`err.name`).
fn error_name(err: &FlowError) -> &'static str {
    match err {
        FlowError::Unsupported => "UnsupportedError",
        FlowError::InsecureContext => "InsecureContextError",
        FlowError::SensorUnavailable => "SensorUnavailableError",
        FlowError::NotAllowed(_) => "NotAllowedError",
        FlowError::Security => "SecurityError",
        FlowError::Aborted(_) => "AbortError",
        FlowError::AlreadyEnrolled => "AlreadyEnrolledError",
        FlowError::NoEnrollment => "NoEnrollmentError",
        FlowError::Failed(_) => "VerificationFailedError",
        FlowError::CameraUnavailable(_) => "CameraUnavailableError",
        FlowError::CameraBusy => "CameraBusyError",
        FlowError::Busy(_) => "BusyError",
        FlowError::Cancelled => "CancelledError",
        FlowError::Storage(_) => "StorageError",
        FlowError::Entropy(_) => "EntropyError",
    }
}

/// JS `Error` whose message is the user-facing notice.
fn js_error(err: FlowError) -> JsValue {
    let error = js_sys::Error::new(&err.to_string());
    error.set_name(error_name(&err));
    if let Err(reflect_err) = js_sys::Reflect::set(
        &error,
        &JsValue::from_str("retryable"),
        &JsValue::from_bool(err.is_retryable()),
    ) {
        report_js_error("Unable to tag error as retryable", reflect_err);
    }
    error.into()
}

fn report_js_error(context: &str, err: JsValue) {
    web_sys::console::error_2(&JsValue::from_str(context), &err);
}

fn report_callback_error(which: &str, err: JsValue) {
    report_js_error(&format!("{which} callback threw"), err);
}

/// Forwards flow signals to page callbacks.
struct JsObserver {
    on_success: Function,
    on_close: Function,
    on_state_change: Option<Function>,
}

impl FlowObserver for JsObserver {
    fn on_state_change(&self, from: FlowState, to: FlowState) {
        if let Some(callback) = &self.on_state_change {
            let result = callback.call2(
                &JsValue::NULL,
                &JsValue::from_str(&from.to_string()),
                &JsValue::from_str(&to.to_string()),
            );
            if let Err(err) = result {
                report_callback_error("onStateChange", err);
            }
        }
    }

    fn on_success(&self, verdict: &Verdict) {
        let payload = to_js(verdict).unwrap_or(JsValue::UNDEFINED);
        if let Err(err) = self.on_success.call1(&JsValue::NULL, &payload) {
            report_callback_error("onSuccess", err);
        }
    }

    fn on_dismiss(&self) {
        if let Err(err) = self.on_close.call0(&JsValue::NULL) {
            report_callback_error("onClose", err);
        }
    }
}

/// Fingerprint / face verification modal.
#[wasm_bindgen]
pub struct BiometricModal {
    flow: Rc<IdentityVerificationFlow>,
    preview: PreviewHandle,
}

#[wasm_bindgen]
impl BiometricModal {
    /// Create a modal for the current page.
    ///
    /// `on_success(verdict)` fires once identity is verified; `on_close()`
    /// fires when the modal is dismissed. Exactly one of them fires per
    /// session.
    #[wasm_bindgen(constructor)]
    pub fn new(
        on_success: Function,
        on_close: Function,
        on_state_change: Option<Function>,
    ) -> Result<BiometricModal, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let href = window.location().href()?;
        let user_agent = window.navigator().user_agent().unwrap_or_default();
        let context = PageContext::from_location(&href, &user_agent)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let store = LocalStorageStore::open().map_err(|e| js_error(e.into()))?;

        let preview: PreviewHandle = Rc::new(RefCell::new(None));
        let flow = IdentityVerificationFlow::builder(
            Rc::new(BrowserAuthenticator::new()),
            Rc::new(BrowserCamera::new(preview.clone())),
            Rc::new(store),
            Rc::new(WindowTimer),
        )
        .context(context)
        .config(FlowConfig::default())
        .observer(Rc::new(JsObserver {
            on_success,
            on_close,
            on_state_change,
        }))
        .build();

        Ok(Self {
            flow: Rc::new(flow),
            preview,
        })
    }

    /// Resolves to `"available"`, `"unsupported"` or `"insecure-context"`.
    pub fn check_capability(&self) -> Promise {
        let flow = self.flow.clone();
        future_to_promise(async move {
            let capability: Capability = flow.check_capability().await;
            Ok(JsValue::from_str(&capability.to_string()))
        })
    }

    /// Enroll the device fingerprint. Resolves to the hex credential id.
    pub fn enroll(&self) -> Promise {
        let flow = self.flow.clone();
        future_to_promise(async move {
            let record = flow.enroll().await.map_err(js_error)?;
            Ok(JsValue::from_str(&record.credential_id))
        })
    }

    /// Verify against the enrolled fingerprint. Resolves to the verdict.
    pub fn verify(&self) -> Promise {
        let flow = self.flow.clone();
        future_to_promise(async move {
            let verdict = flow.verify().await.map_err(js_error)?;
            to_js(&verdict)
        })
    }

    /// Open the front camera. Attach [`Self::camera_stream`] to a mirrored
    /// `<video>` once this resolves.
    pub fn use_camera(&self) -> Promise {
        let flow = self.flow.clone();
        future_to_promise(async move {
            flow.use_camera_fallback().await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Run the (simulated) face check. Resolves to the verdict.
    pub fn confirm_face(&self) -> Promise {
        let flow = self.flow.clone();
        future_to_promise(async move {
            let verdict = flow.confirm_face().await.map_err(js_error)?;
            to_js(&verdict)
        })
    }

    pub fn go_back(&self) -> Result<(), JsValue> {
        self.flow.go_back().map_err(js_error)
    }

    pub fn reset_enrollment(&self) -> Result<(), JsValue> {
        self.flow.reset_enrollment().map_err(js_error)
    }

    /// Dismiss the modal. Stops the camera immediately.
    pub fn close(&self) {
        self.flow.close();
    }

    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.flow.state().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn notice(&self) -> Option<String> {
        self.flow.notice()
    }

    #[wasm_bindgen(getter)]
    pub fn is_enrolled(&self) -> bool {
        self.flow.is_enrolled()
    }

    /// The live preview stream while the camera is open.
    #[wasm_bindgen(getter)]
    pub fn camera_stream(&self) -> Option<MediaStream> {
        self.preview.borrow().clone()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{Ceremony, StoreError};

    #[test]
    fn test_error_names_are_distinct_for_shown_errors() {
        let errors = [
            FlowError::NoEnrollment,
            FlowError::AlreadyEnrolled,
            FlowError::NotAllowed(Ceremony::Verify),
            FlowError::Unsupported,
            FlowError::InsecureContext,
            FlowError::Storage(StoreError::Write("quota".into())),
        ];
        let mut names: Vec<_> = errors.iter().map(error_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), errors.len());
    }

    #[test]
    fn test_version() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }
}
