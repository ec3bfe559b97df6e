//! Collaborator doubles shared by the unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::capture_report::CaptureReport;
use crate::models::error::CaptureError;
use crate::models::sensor_models::{PayloadInfo, FRAME_CAPACITY};
use crate::models::state::CaptureState;
use crate::processing::frame_queue::FrameProducer;
use crate::session::inference::WindowStatus;
use crate::storage::memory_region::MemoryRegion;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::frame_source::FrameSource;
use crate::traits::header_builder::{HeaderBlock, HeaderBuilder, SignatureSpec};
use crate::traits::signature::SignatureContext;
use crate::traits::storage_region::StorageRegion;

/// Little-endian i16 ramp `0, 1, 2, ...` as the producer would deliver it.
pub fn ramp_bytes(start: u16, samples: usize) -> Vec<u8> {
    (0..samples)
        .flat_map(|i| start.wrapping_add(i as u16).to_le_bytes())
        .collect()
}

/// Thread pushing an i16 ramp, `frame_samples` per frame, while recording
/// is enabled. The ramp only advances on accepted frames.
pub struct PatternSource {
    frame_samples: usize,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
    pub starts: usize,
    pub stops: usize,
    /// `stop` joins the thread, then reports an error.
    pub fail_stop: bool,
    /// Push one frame larger than a [`SampleFrame`](crate::models::sensor_models::SampleFrame) before the ramp.
    pub oversized_first: bool,
}

impl PatternSource {
    pub fn new(frame_samples: usize) -> Self {
        Self {
            frame_samples,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            starts: 0,
            stops: 0,
            fail_stop: false,
            oversized_first: false,
        }
    }
}

impl FrameSource for PatternSource {
    fn start(&mut self, producer: FrameProducer) -> Result<(), CaptureError> {
        self.starts += 1;
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let frame_samples = self.frame_samples;
        let mut oversized = self.oversized_first;

        let handle = thread::Builder::new()
            .name("pattern-source".into())
            .spawn(move || {
                let mut next: u16 = 0;
                while running.load(Ordering::SeqCst) {
                    if !producer.is_recording() {
                        thread::sleep(Duration::from_micros(200));
                        continue;
                    }
                    if oversized {
                        producer.push(&vec![0x5A; FRAME_CAPACITY + 2]);
                        oversized = false;
                        continue;
                    }
                    if producer.push(&ramp_bytes(next, frame_samples)) {
                        next = next.wrapping_add(frame_samples as u16);
                    }
                }
            })
            .map_err(|e| CaptureError::SourceFailure(e.to_string()))?;

        *self.handle.lock() = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.stops += 1;
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            handle
                .join()
                .map_err(|_| CaptureError::SourceFailure("pattern thread panicked".into()))?;
        }
        if self.fail_stop {
            return Err(CaptureError::SourceFailure("stop failed".into()));
        }
        Ok(())
    }

    fn frame_period_us(&self) -> u64 {
        0
    }
}

/// Source whose frames are pushed by the test through a producer taken from
/// the queue directly.
#[derive(Default)]
pub struct ManualSource {
    pub starts: usize,
    pub stops: usize,
    pub fail_start: bool,
}

impl FrameSource for ManualSource {
    fn start(&mut self, _producer: FrameProducer) -> Result<(), CaptureError> {
        if self.fail_start {
            return Err(CaptureError::SourceFailure("no device".into()));
        }
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        self.stops += 1;
        Ok(())
    }

    fn frame_period_us(&self) -> u64 {
        32_000
    }
}

/// [`MemoryRegion`] with switchable faults and operation counters.
pub struct FaultyRegion {
    pub inner: MemoryRegion,
    pub fail_writes: bool,
    /// 1-based write calls that fail.
    pub fail_write_calls: Vec<usize>,
    pub fail_reads: bool,
    pub fail_erases: bool,
    /// 1-based erase calls that fail.
    pub fail_erase_calls: Vec<usize>,
    pub writes: usize,
    pub reads: usize,
    pub erases: usize,
}

impl FaultyRegion {
    pub fn new(inner: MemoryRegion) -> Self {
        Self {
            inner,
            fail_writes: false,
            fail_write_calls: Vec::new(),
            fail_reads: false,
            fail_erases: false,
            fail_erase_calls: Vec::new(),
            writes: 0,
            reads: 0,
            erases: 0,
        }
    }
}

impl StorageRegion for FaultyRegion {
    fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), String> {
        self.writes += 1;
        if self.fail_writes || self.fail_write_calls.contains(&self.writes) {
            return Err("injected write fault".into());
        }
        self.inner.write_at(offset, data)
    }

    fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), String> {
        self.reads += 1;
        if self.fail_reads {
            return Err("injected read fault".into());
        }
        self.inner.read_at(offset, buf)
    }

    fn erase_at(&mut self, offset: usize, len: usize) -> Result<(), String> {
        self.erases += 1;
        if self.fail_erases || self.fail_erase_calls.contains(&self.erases) {
            return Err("injected erase fault".into());
        }
        self.inner.erase_at(offset, len)
    }

    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

/// SHA-256 truncated to 8 bytes, so a 16 character digest slot fits a
/// small fixed header.
pub struct ShortSigner {
    hasher: Sha256,
}

impl ShortSigner {
    pub const LEN: usize = 8;

    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    pub fn digest_of(data: &[u8]) -> Vec<u8> {
        Sha256::digest(data)[..Self::LEN].to_vec()
    }
}

impl SignatureContext for ShortSigner {
    fn update(&mut self, data: &[u8]) -> Result<(), String> {
        self.hasher.update(data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<usize, String> {
        if out.len() < Self::LEN * 2 {
            return Err("digest buffer too small".into());
        }
        let digest = std::mem::take(&mut self.hasher).finalize();
        out[..Self::LEN].copy_from_slice(&digest[..Self::LEN]);
        Ok(Self::LEN)
    }

    fn reset(&mut self) {
        self.hasher = Sha256::new();
    }

    fn digest_len(&self) -> usize {
        Self::LEN
    }

    fn algorithm(&self) -> &str {
        "SHA256-64"
    }
}

/// Signer whose `update` always fails.
pub struct BrokenSigner;

impl SignatureContext for BrokenSigner {
    fn update(&mut self, _data: &[u8]) -> Result<(), String> {
        Err("accumulator fault".into())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<usize, String> {
        out[..4].fill(0);
        Ok(4)
    }

    fn reset(&mut self) {}

    fn digest_len(&self) -> usize {
        4
    }

    fn algorithm(&self) -> &str {
        "BROKEN"
    }
}

/// [`ShortSigner`] whose `finish` always fails.
pub struct UnfinishedSigner(pub ShortSigner);

impl SignatureContext for UnfinishedSigner {
    fn update(&mut self, data: &[u8]) -> Result<(), String> {
        self.0.update(data)
    }

    fn finish(&mut self, _out: &mut [u8]) -> Result<usize, String> {
        Err("finalize fault".into())
    }

    fn reset(&mut self) {
        self.0.reset();
    }

    fn digest_len(&self) -> usize {
        ShortSigner::LEN
    }

    fn algorithm(&self) -> &str {
        self.0.algorithm()
    }
}

/// Header of exactly `used_len` non-zero bytes: `SIG:` + digest slot of
/// `'0'` + `'.'` filler, zero padded to `capacity`.
pub struct FixedHeaderBuilder {
    pub used_len: usize,
    pub capacity: usize,
}

impl FixedHeaderBuilder {
    pub const SIGNATURE_INDEX: usize = 4;
}

impl HeaderBuilder for FixedHeaderBuilder {
    fn build(&self, _payload: &PayloadInfo, signature: SignatureSpec<'_>) -> Result<HeaderBlock, String> {
        let slot_end = Self::SIGNATURE_INDEX + signature.digest_len * 2;
        if slot_end > self.used_len || self.used_len > self.capacity {
            return Err("fixed header too small".into());
        }
        let mut bytes = vec![0u8; self.capacity];
        bytes[..Self::SIGNATURE_INDEX].copy_from_slice(b"SIG:");
        bytes[Self::SIGNATURE_INDEX..slot_end].fill(b'0');
        bytes[slot_end..self.used_len].fill(b'.');
        Ok(HeaderBlock {
            bytes,
            used_len: self.used_len,
            signature_index: Self::SIGNATURE_INDEX,
        })
    }
}

/// Delegate that records every callback.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<CaptureState>>,
    pub windows: Mutex<Vec<(u64, WindowStatus)>>,
    pub errors: Mutex<Vec<CaptureError>>,
    pub reports: Mutex<Vec<CaptureReport>>,
    pub callbacks: AtomicUsize,
}

impl CaptureDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: &CaptureState) {
        self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.states.lock().push(state.clone());
    }

    fn on_window(&self, index: u64, status: WindowStatus) {
        self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().push((index, status));
    }

    fn on_error(&self, error: &CaptureError) {
        self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.errors.lock().push(error.clone());
    }

    fn on_capture_finished(&self, report: &CaptureReport) {
        self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.reports.lock().push(report.clone());
    }
}
