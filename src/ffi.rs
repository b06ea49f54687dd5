//! FFI bindings for Correcaminos
//!
//! This module provides C-compatible functions for embedding the tracker in a
//! mobile host. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `cr_free_string`.
//!
//! The FFI tracker is synchronous. The host owns the reset timer: when a
//! returned snapshot has `reset_pending: true`, the host calls
//! `cr_tracker_reset_gauge` after `cr_tracker_reset_delay_ms` milliseconds,
//! or drops the timer when it tears the tracker down.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use tracing::debug;

use crate::config::TrackerConfig;
use crate::tracker::ProgressTracker;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

// ============================================================================
// Tracker lifecycle
// ============================================================================

/// Opaque handle to a ProgressTracker
pub struct TrackerFfiHandle {
    tracker: ProgressTracker,
}

impl TrackerFfiHandle {
    /// Schedule a reset if the goal was reached, then serialize the snapshot
    fn snapshot_after_change(&mut self) -> *mut c_char {
        self.tracker.schedule_reset_if_due();
        match self.tracker.snapshot_json() {
            Ok(json) => string_to_cstr(&json),
            Err(e) => {
                set_last_error(&e.to_string());
                ptr::null_mut()
            }
        }
    }
}

/// Create a tracker with default goals (5000 steps, 2000 kcal).
///
/// # Safety
/// - Returns a pointer to a newly allocated tracker.
/// - Must be freed with `cr_tracker_free`.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_new() -> *mut TrackerFfiHandle {
    clear_last_error();
    let handle = Box::new(TrackerFfiHandle {
        tracker: ProgressTracker::default(),
    });
    Box::into_raw(handle)
}

/// Create a tracker from configuration JSON.
///
/// # Safety
/// - `config_json` must be a valid null-terminated C string.
/// - Must be freed with `cr_tracker_free`.
/// - Returns NULL on error; call `cr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_new_with_config(
    config_json: *const c_char,
) -> *mut TrackerFfiHandle {
    clear_last_error();

    let json_str = match cstr_to_string(config_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return ptr::null_mut();
        }
    };

    match TrackerConfig::from_json(&json_str) {
        Ok(config) => Box::into_raw(Box::new(TrackerFfiHandle {
            tracker: ProgressTracker::new(&config),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_free(tracker: *mut TrackerFfiHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

// ============================================================================
// Step input
// ============================================================================

/// Take one manual step and return the snapshot JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns a newly allocated string that must be freed with `cr_free_string`.
/// - Returns NULL on error; call `cr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_take_step(tracker: *mut TrackerFfiHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;
    handle.tracker.take_step();
    handle.snapshot_after_change()
}

/// Forward a pedometer callback and return the snapshot JSON.
///
/// `count` is the cumulative step count since counting started; a negative
/// value means the callback carried no data. Readings with `has_error` set
/// or without data are ignored.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns a newly allocated string that must be freed with `cr_free_string`.
/// - Returns NULL on error; call `cr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_on_step_count_update(
    tracker: *mut TrackerFfiHandle,
    count: i64,
    has_error: bool,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;
    let count = u64::try_from(count).ok();
    let error = has_error.then_some("sensor reported an error");
    if let Err(dropped) = handle.tracker.on_step_count_update(count, error) {
        debug!(reason = %dropped, "cr_tracker_on_step_count_update: reading dropped");
    }
    handle.snapshot_after_change()
}

// ============================================================================
// Goals
// ============================================================================

/// Set the daily step goal.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns 0 on success, non-zero on error (the prior goal is kept).
/// - On error, call `cr_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_set_step_goal(
    tracker: *mut TrackerFfiHandle,
    goal: i64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;
    match handle.tracker.set_step_goal(goal) {
        Ok(_) => {
            handle.tracker.schedule_reset_if_due();
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Set the daily step goal from text field input.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - `input` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error (the prior goal is kept).
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_set_step_goal_text(
    tracker: *mut TrackerFfiHandle,
    input: *const c_char,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;

    let input_str = match cstr_to_string(input) {
        Some(s) => s,
        None => {
            set_last_error("Invalid input string pointer");
            return -1;
        }
    };

    match handle.tracker.set_step_goal_from_input(&input_str) {
        Ok(_) => {
            handle.tracker.schedule_reset_if_due();
            0
        }
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Set the daily calorie goal.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns 0 on success, non-zero on error (the prior goal is kept).
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_set_calorie_goal(
    tracker: *mut TrackerFfiHandle,
    goal: f64,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;
    match handle.tracker.set_calorie_goal(goal) {
        Ok(_) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Gauge reset
// ============================================================================

/// Delay the host should wait before calling `cr_tracker_reset_gauge`.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns 0 for a NULL tracker.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_reset_delay_ms(tracker: *const TrackerFfiHandle) -> u64 {
    if tracker.is_null() {
        return 0;
    }
    (*tracker).tracker.reset_delay().as_millis() as u64
}

/// Return the gauge counter to zero and return the snapshot JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns a newly allocated string that must be freed with `cr_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_reset_gauge(tracker: *mut TrackerFfiHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;
    handle.tracker.reset_gauge();
    handle.snapshot_after_change()
}

// ============================================================================
// Queries
// ============================================================================

/// Get the current snapshot JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns a newly allocated string that must be freed with `cr_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_snapshot(tracker: *const TrackerFfiHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match (*tracker).tracker.snapshot_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Get the milestone history as a JSON array.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `cr_tracker_new*`.
/// - Returns a newly allocated string that must be freed with `cr_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cr_tracker_history(tracker: *const TrackerFfiHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    match serde_json::to_string(&(*tracker).tracker.history()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Correcaminos functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Correcaminos function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cr_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Correcaminos call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cr_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cr_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

/// Get the information page URL opened by the info action.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `cr_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cr_info_url() -> *mut c_char {
    string_to_cstr(crate::link::INFO_URL)
}
