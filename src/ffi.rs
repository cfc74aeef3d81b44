//! C ABI for native mobile hosts
//!
//! Strings returned by this module are owned by the library and must be
//! released with [`chart_judge_string_free`].

use log::error;
use std::any::Any;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::OnceLock;

use crate::bridge::{self, BridgeResponse, FailureRecord};
use crate::error::JudgeError;
use crate::pipeline::ChartJudge;

fn shared_judge() -> &'static ChartJudge {
    static JUDGE: OnceLock<ChartJudge> = OnceLock::new();
    JUDGE.get_or_init(ChartJudge::default)
}

fn into_c_string(text: String) -> *mut c_char {
    // CString rejects interior NULs.
    let text = text.replace('\0', "");
    CString::new(text).map_or(std::ptr::null_mut(), CString::into_raw)
}

/// Run `analysis`, turning a panic into an `internal_error` record
///
/// Unwinding across the C boundary would abort the host process.
fn guarded(analysis: impl FnOnce() -> BridgeResponse) -> BridgeResponse {
    panic::catch_unwind(AssertUnwindSafe(analysis)).unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("Analysis panicked: {}", message);
        let err = JudgeError::internal(format!("analysis panicked: {}", message));
        BridgeResponse::Failure(FailureRecord::from(&err))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(text) = payload.downcast_ref::<&str>() {
        *text
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.as_str()
    } else {
        "unknown panic"
    }
}

/// # Safety
/// Non-null pointers must reference valid NUL-terminated strings
unsafe fn path_arg<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, JudgeError> {
    if ptr.is_null() {
        return Err(JudgeError::invalid_parameter(name, "null"));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| JudgeError::invalid_parameter(name, "not valid UTF-8"))
}

/// Judge the chart in `source_path` and write the output to `destination_path`
///
/// Returns the JSON boundary record; an empty destination skips writing.
///
/// # Safety
/// Dereferences raw pointers
#[no_mangle]
pub unsafe extern "C" fn chart_judge_process(
    source_path: *const c_char,
    destination_path: *const c_char,
) -> *mut c_char {
    let args = unsafe {
        path_arg(source_path, "source_path")
            .and_then(|src| path_arg(destination_path, "destination_path").map(|dst| (src, dst)))
    };
    let response = match args {
        Ok((src, dst)) => {
            guarded(|| bridge::process(shared_judge(), Path::new(src), Path::new(dst)))
        }
        Err(err) => BridgeResponse::Failure(FailureRecord::from(&err)),
    };
    into_c_string(response.to_json())
}

/// Release a string returned by this library
///
/// # Safety
/// `ptr` must come from this library and not be freed twice
#[no_mangle]
pub unsafe extern "C" fn chart_judge_string_free(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Library version; free with [`chart_judge_string_free`]
#[no_mangle]
pub extern "C" fn chart_judge_version() -> *mut c_char {
    into_c_string(crate::version().to_string())
}
