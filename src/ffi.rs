//! FFI bindings for Synheart Behavior
//!
//! This module provides C-compatible functions for driving a [`BehaviorEngine`] from
//! mobile host code. All functions use C strings (null-terminated); strings returned by
//! this module are allocated here and must be freed with `behavior_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::capability::Capability;
use crate::config::BehaviorConfig;
use crate::context::{DeviceSample, HostInfo, MotionState, SystemState};
use crate::engine::BehaviorEngine;
use crate::error::BehaviorError;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn set_engine_error(err: &BehaviorError) {
    set_last_error(&format!("{}: {}", err.code(), err));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn to_json_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&format!("ENCODING_ERROR: {}", e));
            ptr::null_mut()
        }
    }
}

/// Opaque handle to a BehaviorEngine
pub struct BehaviorEngineHandle {
    engine: BehaviorEngine,
}

unsafe fn engine_ref<'a>(handle: *const BehaviorEngineHandle) -> Option<&'a BehaviorEngine> {
    if handle.is_null() {
        set_last_error("Null engine pointer");
        return None;
    }
    Some(&(*handle).engine)
}

/// Parse a JSON argument and hand it to `apply`; 0 on success, -1 on error
unsafe fn with_json_arg<T: DeserializeOwned>(
    handle: *const BehaviorEngineHandle,
    json: *const c_char,
    apply: impl FnOnce(&BehaviorEngine, T),
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_ref(handle) else {
        return -1;
    };
    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return -1;
    };

    match serde_json::from_str::<T>(&json_str) {
        Ok(value) => {
            apply(engine, value);
            0
        }
        Err(e) => {
            set_engine_error(&BehaviorError::from(e));
            -1
        }
    }
}

// ============================================================================
// Engine Lifecycle
// ============================================================================

/// Create an engine from a JSON configuration. NULL config selects the defaults.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `behavior_engine_free`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_new(config_json: *const c_char) -> *mut BehaviorEngineHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        BehaviorConfig::default()
    } else {
        let Some(json_str) = cstr_to_string(config_json) else {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        };
        match BehaviorConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_engine_error(&e);
                return ptr::null_mut();
            }
        }
    };

    match BehaviorEngine::configure(config) {
        Ok(engine) => Box::into_raw(Box::new(BehaviorEngineHandle { engine })),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Free an engine.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_free(engine: *mut BehaviorEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Mark the engine ready. Returns 0 on success, -1 on error.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_initialize(engine: *const BehaviorEngineHandle) -> i32 {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return -1;
    };
    match engine.initialize() {
        Ok(()) => 0,
        Err(e) => {
            set_engine_error(&e);
            -1
        }
    }
}

// ============================================================================
// Sessions
// ============================================================================

/// Start a session and return its handle as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_start_session(
    engine: *const BehaviorEngineHandle,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return ptr::null_mut();
    };
    match engine.start_session() {
        Ok(handle) => to_json_cstr(&handle),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Ingest one JSON-encoded event.
///
/// Returns 0 whenever the call reached the engine; rejected events are reported through
/// `behavior_engine_diagnostics`, not here.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `event_json` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_ingest(
    engine: *const BehaviorEngineHandle,
    event_json: *const c_char,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return -1;
    };
    let Some(json_str) = cstr_to_string(event_json) else {
        set_last_error("Invalid JSON string pointer");
        return -1;
    };
    engine.ingest_json(&json_str);
    0
}

/// End a session and return its summary as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `session_id` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
/// - Returns NULL on error; call `behavior_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_end_session(
    engine: *const BehaviorEngineHandle,
    session_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return ptr::null_mut();
    };
    let Some(id) = cstr_to_string(session_id) else {
        set_last_error("Invalid session_id string pointer");
        return ptr::null_mut();
    };

    match engine.end_session(&id) {
        Ok(summary) => to_json_cstr(&summary),
        Err(e) => {
            set_engine_error(&e);
            ptr::null_mut()
        }
    }
}

/// Live stats as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_current_stats(
    engine: *const BehaviorEngineHandle,
) -> *mut c_char {
    clear_last_error();

    match engine_ref(engine) {
        Some(engine) => to_json_cstr(&engine.current_stats()),
        None => ptr::null_mut(),
    }
}

/// Ingestion counters as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - Returns a newly allocated string that must be freed with `behavior_free_string`.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_diagnostics(
    engine: *const BehaviorEngineHandle,
) -> *mut c_char {
    clear_last_error();

    match engine_ref(engine) {
        Some(engine) => to_json_cstr(&engine.diagnostics()),
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Context and Capabilities
// ============================================================================

/// Set host info from JSON (`{"os": ..., "app_id": ..., "app_name": ...}`).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_set_host_info(
    engine: *const BehaviorEngineHandle,
    json: *const c_char,
) -> i32 {
    with_json_arg(engine, json, |engine, host: HostInfo| engine.set_host_info(host))
}

/// Set system state from JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_set_system_state(
    engine: *const BehaviorEngineHandle,
    json: *const c_char,
) -> i32 {
    with_json_arg(engine, json, |engine, state: SystemState| {
        engine.set_system_state(state)
    })
}

/// Record one device sample from JSON.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_record_device_sample(
    engine: *const BehaviorEngineHandle,
    json: *const c_char,
) -> i32 {
    with_json_arg(engine, json, |engine, sample: DeviceSample| {
        engine.record_device_sample(sample)
    })
}

/// Set the motion classification from JSON; ignored unless motion-lite is enabled.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_set_motion_state(
    engine: *const BehaviorEngineHandle,
    json: *const c_char,
) -> i32 {
    with_json_arg(engine, json, |engine, motion: MotionState| {
        engine.set_motion_state(motion)
    })
}

/// Report a platform grant. `capability` is `notification_listener` or `call_state`.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
/// - `capability` must be a valid null-terminated C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_report_capability(
    engine: *const BehaviorEngineHandle,
    capability: *const c_char,
    granted: bool,
) -> i32 {
    clear_last_error();

    let Some(engine) = engine_ref(engine) else {
        return -1;
    };
    let Some(name) = cstr_to_string(capability) else {
        set_last_error("Invalid capability string pointer");
        return -1;
    };

    match serde_json::from_value::<Capability>(serde_json::Value::String(name)) {
        Ok(capability) => {
            engine.report_capability(capability, granted);
            0
        }
        Err(e) => {
            set_engine_error(&BehaviorError::from(e));
            -1
        }
    }
}

/// Whether notification events can be observed.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_check_notification_permission(
    engine: *const BehaviorEngineHandle,
) -> bool {
    engine_ref(engine).is_some_and(|e| e.check_notification_permission())
}

/// Whether call events can be observed.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `behavior_engine_new`.
#[no_mangle]
pub unsafe extern "C" fn behavior_engine_check_call_permission(
    engine: *const BehaviorEngineHandle,
) -> bool {
    engine_ref(engine).is_some_and(|e| e.check_call_permission())
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `behavior_*` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn behavior_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message, prefixed with its error code.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next `behavior_*` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn behavior_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn behavior_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        behavior_free_string(ptr);
        s
    }

    unsafe fn last_error() -> String {
        let error = behavior_last_error();
        assert!(!error.is_null());
        CStr::from_ptr(error).to_str().unwrap().to_string()
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let engine = behavior_engine_new(ptr::null());
            assert!(!engine.is_null());
            assert_eq!(behavior_engine_initialize(engine), 0);

            let host = CString::new(r#"{"os": "Android 14", "app_id": "com.example"}"#).unwrap();
            assert_eq!(behavior_engine_set_host_info(engine, host.as_ptr()), 0);

            let handle: serde_json::Value =
                serde_json::from_str(&take_string(behavior_engine_start_session(engine))).unwrap();
            let session_id = handle["session_id"].as_str().unwrap().to_string();

            let event = CString::new(
                r#"{
                    "event_type": "tap",
                    "timestamp": { "monotonic_ms": 3600000, "wall_clock": "2024-01-15T14:00:00Z" },
                    "metrics": { "tap_duration": 80 }
                }"#,
            )
            .unwrap();
            assert_eq!(behavior_engine_ingest(engine, event.as_ptr()), 0);

            let stats = take_string(behavior_engine_current_stats(engine));
            assert!(stats.contains("app_switches_per_minute"));

            let id = CString::new(session_id.clone()).unwrap();
            let summary: serde_json::Value =
                serde_json::from_str(&take_string(behavior_engine_end_session(engine, id.as_ptr())))
                    .unwrap();
            assert_eq!(summary["session_id"], session_id);
            assert_eq!(summary["app_id"], "com.example");
            assert_eq!(summary["activity_summary"]["total_events"], 1);

            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            let bad_config = CString::new("not json").unwrap();
            assert!(behavior_engine_new(bad_config.as_ptr()).is_null());
            assert!(last_error().starts_with("JSON_ERROR"));

            let engine = behavior_engine_new(ptr::null());
            assert!(behavior_engine_start_session(engine).is_null());
            assert!(last_error().starts_with("NOT_INITIALIZED"));

            behavior_engine_initialize(engine);
            let id = CString::new("missing").unwrap();
            assert!(behavior_engine_end_session(engine, id.as_ptr()).is_null());
            assert!(last_error().starts_with("SESSION_NOT_FOUND"));

            assert_eq!(behavior_engine_initialize(ptr::null()), -1);
            assert_eq!(last_error(), "Null engine pointer");

            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_capabilities() {
        unsafe {
            let engine = behavior_engine_new(ptr::null());
            let name = CString::new("call_state").unwrap();
            assert_eq!(behavior_engine_report_capability(engine, name.as_ptr(), true), 0);
            assert!(behavior_engine_check_call_permission(engine));
            assert!(!behavior_engine_check_notification_permission(engine));

            let unknown = CString::new("camera").unwrap();
            assert_eq!(behavior_engine_report_capability(engine, unknown.as_ptr(), true), -1);

            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_diagnostics() {
        unsafe {
            let engine = behavior_engine_new(ptr::null());
            let garbage = CString::new("{").unwrap();
            assert_eq!(behavior_engine_ingest(engine, garbage.as_ptr()), 0);

            let diagnostics: serde_json::Value =
                serde_json::from_str(&take_string(behavior_engine_diagnostics(engine))).unwrap();
            assert_eq!(diagnostics["malformed_events"], 1);

            behavior_engine_free(engine);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = behavior_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
