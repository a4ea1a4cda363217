//! C ABI over the streaming renderer.
//!
//! A host creates one stream per playback session from a persisted song
//! string, then pulls mono 16-bit PCM into its own buffers, typically from
//! the audio/DMA task.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `ChiptuneStream` (heap-allocated; free it with
//!   `chiptune_stream_destroy`).
//! - Null handles, null buffers and non-UTF-8 strings are rejected with
//!   null / 0 / false; nothing here panics.
//!
//! Threading
//! - A stream is NOT thread-safe; drive it from one thread at a time.

use std::ffi::{c_char, CStr};

use chiptune_engine::{Fill, PatternStream, Song};

/// Opaque stream handed to C.
pub struct ChiptuneStream {
    inner: PatternStream,
}

unsafe fn song_from_c(song: *const c_char) -> Option<Song> {
    if song.is_null() {
        return None;
    }
    // SAFETY: caller passes a NUL-terminated string that outlives this call.
    let s = unsafe { CStr::from_ptr(song) }.to_str().ok()?;
    Some(Song::parse(s))
}

// --- Creation / destruction -------------------------------------------------------

/// Create a stream for `song` (the `tempo=..;d2=..;ns=..;p1=..;p2=..;nz=..;`
/// format). `ch1_sine` renders voice 1 as a sine. Returns null on a null or
/// non-UTF-8 string.
///
/// # Safety
/// `song` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_create(
    sample_rate: u32,
    song: *const c_char,
    ch1_sine: bool,
) -> *mut ChiptuneStream {
    match unsafe { song_from_c(song) } {
        Some(song) => Box::into_raw(Box::new(ChiptuneStream {
            inner: PatternStream::new(sample_rate, song, ch1_sine),
        })),
        None => std::ptr::null_mut(),
    }
}

/// Destroy a stream returned by `chiptune_stream_create`. Null is ignored.
///
/// # Safety
/// `stream` must be null or a live handle; it is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_destroy(stream: *mut ChiptuneStream) {
    if !stream.is_null() {
        // SAFETY: the pointer came from Box::into_raw in chiptune_stream_create.
        drop(unsafe { Box::from_raw(stream) });
    }
}

// --- Rendering -------------------------------------------------------------------

/// Render up to `max_samples` mono samples into `out`.
///
/// Returns the number written; less than `max_samples` means the song
/// ended, 0 means it had already ended (or bad arguments).
///
/// # Safety
/// `out` must be valid for `max_samples` writes of `int16_t`.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_render(
    stream: *mut ChiptuneStream,
    out: *mut i16,
    max_samples: usize,
) -> usize {
    if stream.is_null() || out.is_null() || max_samples == 0 {
        return 0;
    }
    // SAFETY: non-null handle from chiptune_stream_create, caller-sized buffer.
    let s = unsafe { &mut *stream };
    let buf = unsafe { std::slice::from_raw_parts_mut(out, max_samples) };
    s.inner.fill(buf)
}

/// Samples a full pass of the current song produces (0 for a null handle).
///
/// # Safety
/// `stream` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_total_samples(stream: *const ChiptuneStream) -> usize {
    match unsafe { stream.as_ref() } {
        Some(s) => s.inner.total_samples(),
        None => 0,
    }
}

/// Step being played, or -1 before the first render (and for null).
///
/// # Safety
/// `stream` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_playhead(stream: *const ChiptuneStream) -> i32 {
    unsafe { stream.as_ref() }
        .and_then(|s| s.inner.playhead())
        .and_then(|step| i32::try_from(step).ok())
        .unwrap_or(-1)
}

// --- Control ---------------------------------------------------------------------

/// Rewind to the first step with fresh oscillator and noise state.
///
/// # Safety
/// `stream` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_reset(stream: *mut ChiptuneStream) {
    if let Some(s) = unsafe { stream.as_mut() } {
        s.inner.reset();
    }
}

/// Replace the song without rewinding; edits are heard from the next render.
/// Returns false on a null handle or a null / non-UTF-8 string.
///
/// # Safety
/// `stream` must be null or a live handle; `song` null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn chiptune_stream_set_song(
    stream: *mut ChiptuneStream,
    song: *const c_char,
) -> bool {
    let Some(s) = (unsafe { stream.as_mut() }) else {
        return false;
    };
    match unsafe { song_from_c(song) } {
        Some(song) => {
            s.inner.set_song(song);
            true
        }
        None => false,
    }
}
