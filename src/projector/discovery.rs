//! Capture source discovery
//!
//! Lists top-level window titles through the platform's own tooling and
//! keeps only those that look like OBS projectors.

use anyhow::{bail, Context, Result};

use super::CaptureSourceDescriptor;

/// Anything that can enumerate capture sources
pub trait CaptureSourceProvider: Send + Sync {
    /// Enumerate sources. Blocking; run off the async executor.
    fn capture_sources(&self) -> Result<Vec<CaptureSourceDescriptor>>;
}

/// Visible windows of the local desktop
#[derive(Debug, Clone, Default)]
pub struct SystemWindows;

impl CaptureSourceProvider for SystemWindows {
    fn capture_sources(&self) -> Result<Vec<CaptureSourceDescriptor>> {
        #[cfg(target_os = "macos")]
        {
            list_windows_macos()
        }

        #[cfg(target_os = "linux")]
        {
            list_windows_linux()
        }

        #[cfg(target_os = "windows")]
        {
            list_windows_windows()
        }
    }
}

/// Keep the sources whose title contains one of `keywords`, ignoring case.
/// An empty keyword list keeps everything.
pub fn filter_by_keywords(
    sources: Vec<CaptureSourceDescriptor>,
    keywords: &[String],
) -> Vec<CaptureSourceDescriptor> {
    if keywords.is_empty() {
        return sources;
    }
    let keywords: Vec<String> = keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();

    sources
        .into_iter()
        .filter(|source| {
            let lower = source.raw_name.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .collect()
}

// ============================================================================
// Linux Implementation
// ============================================================================

#[cfg(target_os = "linux")]
fn list_windows_linux() -> Result<Vec<CaptureSourceDescriptor>> {
    use std::process::Command;

    let output = Command::new("wmctrl")
        .arg("-l")
        .output()
        .context("Failed to run wmctrl (is it installed?)")?;

    if !output.status.success() {
        bail!(
            "wmctrl exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(parse_wmctrl(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `wmctrl -l` lines: `<id> <desktop> <host> <title...>`
#[cfg_attr(not(any(target_os = "linux", test)), allow(dead_code))]
fn parse_wmctrl(listing: &str) -> Vec<CaptureSourceDescriptor> {
    listing
        .lines()
        .filter_map(|line| {
            let mut rest = line.trim_start();
            let mut fields = Vec::with_capacity(3);
            for _ in 0..3 {
                let end = rest.find(char::is_whitespace)?;
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            let title = rest.trim_end();
            if title.is_empty() {
                return None;
            }
            Some(CaptureSourceDescriptor::new(
                format!("window:{}", fields[0]),
                title,
            ))
        })
        .collect()
}

// ============================================================================
// macOS Implementation
// ============================================================================

#[cfg(target_os = "macos")]
fn list_windows_macos() -> Result<Vec<CaptureSourceDescriptor>> {
    use std::process::Command;

    let script = r#"
        set windowList to ""
        tell application "System Events"
            repeat with aProcess in (every process whose background only is false)
                set processID to unix id of aProcess
                set windowIndex to 0
                repeat with aWindow in (every window of aProcess)
                    set windowIndex to windowIndex + 1
                    set windowList to windowList & processID & "|||" & windowIndex & "|||" & (name of aWindow) & "\n"
                end repeat
            end repeat
        end tell
        return windowList
    "#;

    let output = Command::new("osascript")
        .arg("-e")
        .arg(script)
        .output()
        .context("Failed to run osascript")?;

    if !output.status.success() {
        bail!(
            "osascript exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let mut sources = Vec::new();
    for line in listing.lines() {
        let parts: Vec<&str> = line.splitn(3, "|||").collect();
        if parts.len() < 3 {
            continue;
        }
        let title = parts[2].trim();
        if title.is_empty() || title == "missing value" {
            continue;
        }
        sources.push(CaptureSourceDescriptor::new(
            format!("window:{}:{}", parts[0].trim(), parts[1].trim()),
            title,
        ));
    }
    Ok(sources)
}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(target_os = "windows")]
fn list_windows_windows() -> Result<Vec<CaptureSourceDescriptor>> {
    use std::ffi::{c_void, OsString};
    use std::os::windows::ffi::OsStringExt;

    #[link(name = "user32")]
    extern "system" {
        fn EnumWindows(
            callback: extern "system" fn(*mut c_void, isize) -> i32,
            lparam: isize,
        ) -> i32;
        fn IsWindowVisible(hwnd: *mut c_void) -> i32;
        fn GetWindowTextLengthW(hwnd: *mut c_void) -> i32;
        fn GetWindowTextW(hwnd: *mut c_void, buffer: *mut u16, max_count: i32) -> i32;
    }

    extern "system" fn collect(hwnd: *mut c_void, lparam: isize) -> i32 {
        // SAFETY: lparam is the Vec passed to EnumWindows below, alive for
        // the whole enumeration
        let sources = unsafe { &mut *(lparam as *mut Vec<CaptureSourceDescriptor>) };
        unsafe {
            if IsWindowVisible(hwnd) == 0 {
                return 1;
            }
            let len = GetWindowTextLengthW(hwnd);
            if len <= 0 {
                return 1;
            }
            let mut buffer = vec![0u16; len as usize + 1];
            let copied = GetWindowTextW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32);
            if copied <= 0 {
                return 1;
            }
            let title = OsString::from_wide(&buffer[..copied as usize])
                .to_string_lossy()
                .to_string();
            sources.push(CaptureSourceDescriptor::new(
                format!("window:{:#x}", hwnd as usize),
                title,
            ));
        }
        1
    }

    let mut sources: Vec<CaptureSourceDescriptor> = Vec::new();
    let ok = unsafe { EnumWindows(collect, &mut sources as *mut _ as isize) };
    if ok == 0 {
        bail!("EnumWindows failed");
    }
    Ok(sources)
}
