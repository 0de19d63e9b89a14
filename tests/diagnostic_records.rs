/*
 *  tests/diagnostic_records.rs
 *
 *  Log-level checks for driver redirection: one diagnostic record per
 *  attempt, at the right level. Own test binary because the logger is
 *  process-global.
 *
 *  vkredirect - bring your own driver
 *  (c) 2020-26 Stuart Hunter
 */

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::fs;
use std::sync::Once;

use log::{Level, LevelFilter, Log, Metadata, Record};
use tempfile::TempDir;
use vkredirect::hook::{
    hook_driver, DriverHandle, RedirectPrimitive, RedirectionRequest, DEFAULT_BAIT_NAME,
    DIAGNOSTIC_TARGET,
};

thread_local! {
    // tests run on separate threads, so each sees only its own records
    static CAPTURED: RefCell<Vec<(Level, String, String)>> = const { RefCell::new(Vec::new()) };
}

struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        CAPTURED.with(|c| {
            c.borrow_mut().push((
                record.level(),
                record.target().to_string(),
                record.args().to_string(),
            ))
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INIT: Once = Once::new();

fn capture() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(LevelFilter::Trace);
    });
    CAPTURED.with(|c| c.borrow_mut().clear());
}

fn captured_len() -> usize {
    CAPTURED.with(|c| c.borrow().len())
}

fn diagnostic_levels() -> Vec<Level> {
    CAPTURED.with(|c| {
        c.borrow()
            .iter()
            .filter(|(_, target, _)| target == DIAGNOSTIC_TARGET)
            .map(|(level, _, _)| *level)
            .collect()
    })
}

fn warnings_containing(needle: &str) -> usize {
    CAPTURED.with(|c| {
        c.borrow()
            .iter()
            .filter(|(level, _, msg)| *level == Level::Warn && msg.contains(needle))
            .count()
    })
}

/// Fixed result; notes how many log lines existed at clear and at open
struct Scripted {
    handle: Option<usize>,
    error: Option<&'static str>,
    slot: RefCell<Option<String>>,
    logged_at_clear: Cell<Option<usize>>,
    logged_at_open: Cell<Option<usize>>,
}

impl Scripted {
    fn new(handle: Option<usize>, error: Option<&'static str>) -> Self {
        Self {
            handle,
            error,
            slot: RefCell::new(None),
            logged_at_clear: Cell::new(None),
            logged_at_open: Cell::new(None),
        }
    }
}

impl RedirectPrimitive for Scripted {
    fn clear_error(&self) {
        self.logged_at_clear.set(Some(captured_len()));
        self.slot.borrow_mut().take();
    }

    fn take_error(&self) -> Option<String> {
        self.slot.borrow_mut().take()
    }

    fn open_redirected(&self, _request: &RedirectionRequest<'_>) -> Option<DriverHandle> {
        self.logged_at_open.set(Some(captured_len()));
        if let Some(msg) = self.error {
            *self.slot.borrow_mut() = Some(msg.to_string());
        }
        self.handle.and_then(|addr| DriverHandle::from_raw(addr as *mut c_void))
    }
}

fn request() -> RedirectionRequest<'static> {
    RedirectionRequest::new("/data/tmp", "/data/app/lib", "/data/drivers/turnip", "libturnip.so")
}

#[test]
fn test_success_emits_one_info_record() {
    capture();
    let outcome = hook_driver(&Scripted::new(Some(0x1000), None), &request());

    assert!(outcome.succeeded());
    assert_eq!(diagnostic_levels(), vec![Level::Info]);
}

#[test]
fn test_linker_error_emits_one_error_record() {
    capture();
    let outcome = hook_driver(&Scripted::new(None, Some("dlopen failed")), &request());

    assert!(!outcome.succeeded());
    assert_eq!(diagnostic_levels(), vec![Level::Error]);
}

#[test]
fn test_no_linker_error_emits_one_error_record() {
    capture();
    let outcome = hook_driver(&Scripted::new(None, None), &request());

    assert!(!outcome.succeeded());
    assert_eq!(diagnostic_levels(), vec![Level::Error]);
}

#[test]
fn test_invalid_request_emits_one_error_record() {
    capture();
    let req = RedirectionRequest::new("/data/tmp", "/data/app/lib", "", "libturnip.so");
    let outcome = hook_driver(&Scripted::new(Some(0x1000), None), &req);

    assert!(!outcome.succeeded());
    assert_eq!(diagnostic_levels(), vec![Level::Error]);
}

#[test]
fn test_missing_bait_logs_missing_artifact_warning() {
    capture();
    hook_driver(&Scripted::new(Some(0x1000), None), &request());

    assert_eq!(warnings_containing("MissingArtifact"), 1);
    assert_eq!(warnings_containing("/data/app/lib/libvulkan_freedreno.so"), 1);
}

#[test]
fn test_present_bait_logs_no_missing_artifact_warning() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(DEFAULT_BAIT_NAME), b"\x7fELF").unwrap();
    let hooks = dir.path().to_string_lossy().into_owned();

    capture();
    let req = RedirectionRequest::new("/data/tmp", &hooks, "/data/drivers/turnip", "libturnip.so");
    hook_driver(&Scripted::new(Some(0x1000), None), &req);

    assert_eq!(warnings_containing("MissingArtifact"), 0);
}

#[test]
fn test_nothing_logged_between_clear_and_open() {
    capture();
    let primitive = Scripted::new(None, Some("dlopen failed"));
    hook_driver(&primitive, &request());

    let at_clear = primitive.logged_at_clear.get().unwrap();
    let at_open = primitive.logged_at_open.get().unwrap();
    assert_eq!(at_clear, at_open);
}
