use std::sync::Arc;

use parking_lot::Mutex;

use crate::header::json_header::JsonHeaderBuilder;
use crate::models::capture_report::CaptureReport;
use crate::models::config::CaptureConfiguration;
use crate::models::error::{CaptureError, FailureStage};
use crate::models::sensor_models::SessionDiagnostics;
use crate::models::state::CaptureState;
use crate::processing::frame_queue::FrameQueue;
use crate::signing;
use crate::storage::record::{self, RecordLayout};
use crate::storage::storage_sink::StorageSink;
use crate::traits::capture_delegate::CaptureDelegate;
use crate::traits::frame_source::FrameSource;
use crate::traits::header_builder::{HeaderBuilder, SignatureSpec};
use crate::traits::signature::SignatureContext;
use crate::traits::storage_region::{align_to_block, StorageRegion};

/// Storage-mode capture session: header, streamed samples, sealed digest.
///
/// Data flow:
/// ```text
/// [FrameSource] → [FrameQueue] → [StorageSink] → StorageRegion @ header_offset
///                                      └──────→ SignatureContext
/// ```
///
/// A session owns its storage and signature for its whole lifetime and may
/// be run repeatedly; every run starts from a fresh signature and rewrites
/// the record from offset 0.
pub struct RecordSession<S: StorageRegion> {
    config: CaptureConfiguration,
    storage: S,
    signer: Box<dyn SignatureContext>,
    header_builder: Box<dyn HeaderBuilder>,
    delegate: Option<Arc<dyn CaptureDelegate>>,
    state: Arc<Mutex<CaptureState>>,
    diagnostics: SessionDiagnostics,
    layout: Option<RecordLayout>,
}

impl<S: StorageRegion> RecordSession<S> {
    pub fn new(
        config: CaptureConfiguration,
        storage: S,
        signer: Box<dyn SignatureContext>,
        header_builder: Box<dyn HeaderBuilder>,
    ) -> Self {
        Self {
            config,
            storage,
            signer,
            header_builder,
            delegate: None,
            state: Arc::new(Mutex::new(CaptureState::Idle)),
            diagnostics: SessionDiagnostics::default(),
            layout: None,
        }
    }

    /// Session with the JSON header and the signature selected by
    /// `config.hmac_key`.
    pub fn with_defaults(config: CaptureConfiguration, storage: S) -> Result<Self, CaptureError> {
        let signer = signing::signer_for_key(&config.hmac_key).map_err(CaptureError::ConfigurationFailed)?;
        let header_builder = Box::new(JsonHeaderBuilder::new(config.header_capacity));
        Ok(Self::new(config, storage, signer, header_builder))
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn CaptureDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn state(&self) -> CaptureState {
        self.state.lock().clone()
    }

    /// Shared view of the session state for observers on other threads.
    pub fn state_handle(&self) -> Arc<Mutex<CaptureState>> {
        Arc::clone(&self.state)
    }

    pub fn diagnostics(&self) -> &SessionDiagnostics {
        &self.diagnostics
    }

    /// Layout of the last record whose header reached storage.
    pub fn layout(&self) -> Option<RecordLayout> {
        self.layout
    }

    pub fn config(&self) -> &CaptureConfiguration {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Capture one complete record.
    ///
    /// Blocks the calling task until `target_bytes` have been streamed and
    /// the digest is sealed into block 0. Any error aborts the session; an
    /// error for which [`CaptureError::leaves_unsealed_record`] holds leaves
    /// the header on storage with its placeholder digest.
    pub fn run(&mut self, queue: &mut FrameQueue, source: &mut dyn FrameSource) -> Result<CaptureReport, CaptureError> {
        if self.state.lock().is_active() {
            return Err(CaptureError::InvalidState("a capture is already running".into()));
        }

        match self.run_inner(queue, source) {
            Ok(report) => {
                self.set_state(CaptureState::Completed(Box::new(report.clone())));
                if let Some(ref delegate) = self.delegate {
                    delegate.on_capture_finished(&report);
                }
                Ok(report)
            }
            Err(e) => {
                log::error!("Capture failed at {}: {}", e.stage(), e);
                self.set_state(CaptureState::Failed(e.clone()));
                if let Some(ref delegate) = self.delegate {
                    delegate.on_error(&e);
                }
                Err(e)
            }
        }
    }

    fn run_inner(&mut self, queue: &mut FrameQueue, source: &mut dyn FrameSource) -> Result<CaptureReport, CaptureError> {
        self.config.validate().map_err(CaptureError::ConfigurationFailed)?;
        let target = self.config.target_bytes();
        let erase_len = self.preflight(target)?;

        self.signer.reset();
        self.diagnostics = SessionDiagnostics::default();
        self.layout = None;
        queue.set_recording(false);
        queue.reset();
        queue.reset_high_water();
        queue.reset_rejected();

        self.set_state(CaptureState::ErasingStorage);
        source.start(queue.producer())?;

        let streamed = self.stream(queue, target, erase_len);

        queue.set_recording(false);
        // Unblock a producer stuck on a full queue before joining it.
        queue.reset();
        let stopped = source.stop();
        queue.reset();

        let layout = streamed?;
        // A stop failure does not abort; the streamed record is still sealed.
        if let Err(e) = stopped {
            log::warn!("Frame source did not stop cleanly, sealing anyway: {}", e);
        }
        self.seal(layout, queue.capacity())
    }

    /// Region checks done before anything is erased. Returns the pre-erase length.
    fn preflight(&self, target: usize) -> Result<usize, CaptureError> {
        let block_size = self.storage.block_size();
        let capacity = self.storage.capacity();
        if block_size == 0 || block_size > capacity {
            return Err(CaptureError::ConfigurationFailed(format!(
                "block size {} unusable for region of {} bytes",
                block_size, capacity
            )));
        }
        let erase_len = align_to_block(target + block_size, block_size);
        if erase_len > capacity {
            return Err(CaptureError::ConfigurationFailed(format!(
                "record of {} bytes does not fit region of {} bytes",
                target, capacity
            )));
        }
        Ok(erase_len)
    }

    /// Pre-erase, persist the header and stream frames until `target` bytes
    /// are on storage.
    fn stream(&mut self, queue: &mut FrameQueue, target: usize, erase_len: usize) -> Result<RecordLayout, CaptureError> {
        self.storage.erase_at(0, erase_len).map_err(|reason| CaptureError::StorageEraseFailure {
            stage: FailureStage::Prepare,
            reason,
        })?;

        let layout = self.write_header()?;
        self.layout = Some(layout);
        self.set_state(CaptureState::Sampling { bytes_captured: 0 });
        log::info!(
            "Sampling {} bytes at offset {} (signature at {})",
            target,
            layout.header_offset,
            layout.signature_index
        );

        let mut sink = StorageSink::new(layout.header_offset, target, self.config.frame_error_policy);
        let switch = queue.recording_switch();
        let wait = self.config.frame_wait();
        queue.set_recording(true);

        let result = loop {
            if sink.is_complete() {
                break Ok(());
            }
            let storage = &mut self.storage;
            let signer = self.signer.as_mut();
            let drained = queue.drain_with(wait, |frame| {
                if sink.accept(frame.as_bytes(), &mut *storage, &mut *signer)? {
                    switch.set(false);
                }
                Ok(())
            });
            match drained {
                Ok(count) => {
                    self.diagnostics.frames_received += count as u64;
                    self.set_state(CaptureState::Sampling {
                        bytes_captured: sink.bytes_written() as u64,
                    });
                }
                Err(e) => break Err(e),
            }
        };

        self.diagnostics.bytes_written = sink.bytes_written() as u64;
        self.diagnostics.frame_write_failures = sink.write_failures();
        self.diagnostics.signature_update_failures = sink.update_failures();
        self.diagnostics.frames_rejected = queue.rejected();
        self.diagnostics.queue_high_water = queue.high_water();
        result.map(|_| layout)
    }

    /// Build the header, append the reference trailer, sign the trailer and
    /// persist both at offset 0.
    fn write_header(&mut self) -> Result<RecordLayout, CaptureError> {
        let digest_len = self.signer.digest_len();
        let spec = SignatureSpec {
            algorithm: self.signer.algorithm(),
            digest_len,
        };
        let header = self
            .header_builder
            .build(&self.config.payload_info(), spec)
            .map_err(CaptureError::HeaderBuildFailure)?;
        let (bytes, layout) = record::compose_record_header(&header, &self.config.reference_tag)
            .map_err(CaptureError::HeaderBuildFailure)?;

        let slot_end = layout.signature_index + digest_len * 2;
        if slot_end > layout.end_of_header {
            return Err(CaptureError::HeaderBuildFailure(format!(
                "digest slot [{}, {}) outside header of {} bytes",
                layout.signature_index, slot_end, layout.end_of_header
            )));
        }
        if layout.header_offset > self.storage.block_size() {
            return Err(CaptureError::HeaderBuildFailure(format!(
                "header of {} bytes exceeds block size {}",
                layout.header_offset,
                self.storage.block_size()
            )));
        }

        self.signer
            .update(&bytes[layout.end_of_header..])
            .map_err(|reason| CaptureError::SignatureUpdateFailure {
                stage: FailureStage::HeaderBuild,
                reason,
            })?;
        self.storage
            .write_at(0, &bytes)
            .map_err(|reason| CaptureError::StorageWriteFailure {
                stage: FailureStage::HeaderWrite,
                reason,
            })?;

        log::debug!(
            "Header written: end_of_header={}, trailer={}, header_offset={}",
            layout.end_of_header,
            layout.trailer_len,
            layout.header_offset
        );
        Ok(layout)
    }

    /// Finalize the signature and patch its hex form into block 0.
    fn seal(&mut self, layout: RecordLayout, queue_depth: usize) -> Result<CaptureReport, CaptureError> {
        self.set_state(CaptureState::Sealing);

        let mut out = vec![0u8; self.signer.digest_len() * 2];
        let len = self
            .signer
            .finish(&mut out)
            .map_err(CaptureError::SignatureFinalizeFailure)?;
        let digest = &out[..len];

        let block_size = self.storage.block_size();
        let mut block = vec![0u8; block_size];
        self.storage
            .read_at(0, &mut block)
            .map_err(CaptureError::StorageReadFailure)?;

        record::patch_digest(&mut block, layout.signature_index, digest).map_err(|reason| {
            CaptureError::StorageWriteFailure {
                stage: FailureStage::BlockRewrite,
                reason,
            }
        })?;

        self.storage
            .erase_at(0, block_size)
            .map_err(|reason| CaptureError::StorageEraseFailure {
                stage: FailureStage::BlockErase,
                reason,
            })?;
        self.storage
            .write_at(0, &block)
            .map_err(|reason| CaptureError::StorageWriteFailure {
                stage: FailureStage::BlockRewrite,
                reason,
            })?;

        let bytes = self.diagnostics.bytes_written;
        log::info!("Done sampling, total bytes collected: {}", bytes);
        log::info!("Used buffer, from=0, to={}", layout.header_offset as u64 + bytes);

        let report = CaptureReport::new(
            &self.config.label,
            self.config.target_bytes(),
            layout.header_offset,
            &record::hex_encode(digest),
            self.signer.algorithm(),
            queue_depth,
            &self.diagnostics,
        );

        if report.queue_overran() {
            let overrun = CaptureError::QueueOverrun {
                high_water: report.queue_high_water,
                capacity: queue_depth,
            };
            log::warn!("{}", overrun);
            if let Some(ref delegate) = self.delegate {
                delegate.on_error(&overrun);
            }
        }
        if !report.is_clean() {
            log::warn!(
                "Record sealed with {} failed writes, {} failed signature updates and {} refused frames",
                report.frame_write_failures,
                report.signature_update_failures,
                report.frames_rejected
            );
        }
        Ok(report)
    }

    fn set_state(&self, new_state: CaptureState) {
        *self.state.lock() = new_state.clone();
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::FrameErrorPolicy;
    use crate::signing::{HmacSha256Signer, Sha256Signer};
    use crate::storage::memory_region::MemoryRegion;
    use crate::storage::record::SealState;
    use crate::test_support::{
        ramp_bytes, BrokenSigner, FaultyRegion, FixedHeaderBuilder, ManualSource, PatternSource,
        RecordingDelegate, ShortSigner, UnfinishedSigner,
    };
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    const BLOCK: usize = 4096;

    fn config(sample_length_ms: u32) -> CaptureConfiguration {
        CaptureConfiguration {
            sample_interval_ms: 1.0,
            sample_length_ms,
            frame_wait_ms: Some(2000),
            ..CaptureConfiguration::default()
        }
    }

    fn fixed_session<R: StorageRegion>(config: CaptureConfiguration, storage: R) -> RecordSession<R> {
        RecordSession::new(
            config,
            storage,
            Box::new(ShortSigner::new()),
            Box::new(FixedHeaderBuilder {
                used_len: 40,
                capacity: 1024,
            }),
        )
    }

    #[test]
    fn header_of_forty_bytes_and_ten_sample_bytes() {
        let cfg = CaptureConfiguration {
            sample_width: 1,
            ..config(10)
        };
        let mut session = fixed_session(cfg, MemoryRegion::new(4 * BLOCK, BLOCK));
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(3);

        let report = session.run(&mut queue, &mut source).unwrap();
        let layout = session.layout().unwrap();
        let image = session.storage().as_bytes();

        assert_eq!(layout.end_of_header, 40);
        assert_eq!(layout.trailer_len, 16);
        assert_eq!(layout.header_offset, 56);
        assert_eq!(report.target_bytes, 10);
        assert_eq!(report.bytes_captured, 10);
        assert_eq!(&image[56..66], ramp_bytes(0, 5).as_slice());
        assert!(image[66..BLOCK].iter().all(|&b| b == 0xFF));
        assert_eq!(image[40], 0x6E);
        assert_eq!(&image[41..55], b"Ref-BINARY-i16");
        assert_eq!(image[55], 0xFF);

        let mut signed = image[40..56].to_vec();
        signed.extend_from_slice(&image[56..66]);
        let expected = record::hex_encode(&ShortSigner::digest_of(&signed));
        assert_eq!(report.digest, expected);
        assert_eq!(&image[4..20], expected.as_bytes());
        assert_eq!(source.starts, 1);
        assert_eq!(source.stops, 1);
    }

    #[test]
    fn independent_hmac_matches_sealed_digest() {
        let key = "secret-key";
        let mut session = RecordSession::new(
            config(1000),
            MemoryRegion::new(4 * BLOCK, BLOCK),
            Box::new(HmacSha256Signer::new(key.as_bytes()).unwrap()),
            Box::new(JsonHeaderBuilder::new(1024).with_issued_at(0)),
        );
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(256);

        let report = session.run(&mut queue, &mut source).unwrap();
        let layout = session.layout().unwrap();
        let image = session.storage().as_bytes();
        let data_end = layout.header_offset + report.target_bytes;

        assert_eq!(report.target_bytes, 2000);
        assert_eq!(&image[layout.header_offset..data_end], ramp_bytes(0, 1000).as_slice());
        assert_eq!(image[data_end], 0xFF);

        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(&image[layout.end_of_header..data_end]);
        let expected = record::hex_encode(&mac.finalize().into_bytes());

        assert_eq!(report.digest, expected);
        assert_eq!(report.signature_algorithm, "HS256");
        assert_eq!(
            record::seal_state(image, layout.signature_index, 32),
            SealState::Sealed(expected)
        );
    }

    #[test]
    fn default_session_records_and_reports() {
        let delegate = Arc::new(RecordingDelegate::default());
        let mut session =
            RecordSession::with_defaults(config(200), MemoryRegion::new(4 * BLOCK, BLOCK)).unwrap();
        session.set_delegate(delegate.clone());
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(64);

        let report = session.run(&mut queue, &mut source).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.signature_algorithm, "SHA256");
        assert_eq!(session.diagnostics().bytes_written, 400);
        assert!(matches!(session.state(), CaptureState::Completed(_)));
        assert_eq!(delegate.reports.lock().len(), 1);

        let states = delegate.states.lock();
        assert_eq!(states.first(), Some(&CaptureState::ErasingStorage));
        assert!(states.iter().any(|s| s.is_sampling()));
        assert!(states.contains(&CaptureState::Sealing));
        assert!(states.last().is_some_and(|s| s.is_terminal()));
    }

    #[test]
    fn runs_are_repeatable() {
        let mut session = RecordSession::new(
            config(100),
            MemoryRegion::new(4 * BLOCK, BLOCK),
            Box::new(Sha256Signer::new()),
            Box::new(JsonHeaderBuilder::new(1024).with_issued_at(7)),
        );
        let mut queue = FrameQueue::new(8);

        let first = session.run(&mut queue, &mut PatternSource::new(50)).unwrap();
        let second = session.run(&mut queue, &mut PatternSource::new(50)).unwrap();

        assert_eq!(first.digest, second.digest);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn read_failure_leaves_record_unsealed() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        storage.fail_reads = true;
        let mut session = fixed_session(config(50), storage);
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(10);

        let err = session.run(&mut queue, &mut source).unwrap_err();

        assert!(matches!(err, CaptureError::StorageReadFailure(_)));
        assert!(err.leaves_unsealed_record());
        let storage = session.storage();
        // Only the pre-erase; block 0 was never erased or rewritten.
        assert_eq!(storage.erases, 1);
        assert_eq!(
            record::seal_state(storage.inner.as_bytes(), FixedHeaderBuilder::SIGNATURE_INDEX, ShortSigner::LEN),
            SealState::Unsealed
        );
        assert!(matches!(session.state(), CaptureState::Failed(_)));
        assert_eq!(source.stops, 1);
    }

    #[test]
    fn prepare_erase_failure_writes_nothing() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        storage.fail_erases = true;
        let mut session = fixed_session(config(50), storage);
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut ManualSource::default()).unwrap_err();

        assert_eq!(err.stage(), FailureStage::Prepare);
        assert!(!err.leaves_unsealed_record());
        assert_eq!(session.storage().writes, 0);
        assert!(session.layout().is_none());
    }

    #[test]
    fn header_write_failure_is_reported() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        storage.fail_writes = true;
        let mut session = fixed_session(config(50), storage);
        let mut queue = FrameQueue::new(32);
        let mut source = ManualSource::default();

        let err = session.run(&mut queue, &mut source).unwrap_err();

        assert_eq!(
            err,
            CaptureError::StorageWriteFailure {
                stage: FailureStage::HeaderWrite,
                reason: "injected write fault".into(),
            }
        );
        assert_eq!(source.stops, 1);
        assert!(!queue.is_recording());
    }

    #[test]
    fn trailer_signature_failure_aborts() {
        let mut session = RecordSession::new(
            config(50),
            MemoryRegion::new(4 * BLOCK, BLOCK),
            Box::new(BrokenSigner),
            Box::new(FixedHeaderBuilder {
                used_len: 40,
                capacity: 1024,
            }),
        );
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut ManualSource::default()).unwrap_err();

        assert!(matches!(
            err,
            CaptureError::SignatureUpdateFailure {
                stage: FailureStage::HeaderBuild,
                ..
            }
        ));
        // Nothing persisted after the pre-erase.
        assert!(session.storage().as_bytes().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn oversized_header_fails_build() {
        let mut session = RecordSession::new(
            config(50),
            MemoryRegion::new(4 * BLOCK, BLOCK),
            Box::new(ShortSigner::new()),
            Box::new(FixedHeaderBuilder {
                used_len: 40,
                capacity: 16,
            }),
        );
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut ManualSource::default()).unwrap_err();
        assert!(matches!(err, CaptureError::HeaderBuildFailure(_)));
    }

    #[test]
    fn digest_wider_than_header_fails_build() {
        // A 64 character SHA-256 slot does not fit the 40 byte header.
        let mut session = RecordSession::new(
            config(50),
            MemoryRegion::new(4 * BLOCK, BLOCK),
            Box::new(Sha256Signer::new()),
            Box::new(FixedHeaderBuilder {
                used_len: 40,
                capacity: 1024,
            }),
        );
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut ManualSource::default()).unwrap_err();
        assert!(matches!(err, CaptureError::HeaderBuildFailure(_)));
    }

    #[test]
    fn record_larger_than_region_is_rejected_up_front() {
        let mut session = fixed_session(config(4000), MemoryRegion::new(2 * BLOCK, BLOCK));
        let mut queue = FrameQueue::new(32);
        let mut source = ManualSource::default();

        let err = session.run(&mut queue, &mut source).unwrap_err();

        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
        assert_eq!(source.starts, 0);
    }

    #[test]
    fn source_start_failure_is_reported() {
        let delegate = Arc::new(RecordingDelegate::default());
        let mut session = fixed_session(config(50), MemoryRegion::new(4 * BLOCK, BLOCK));
        session.set_delegate(delegate.clone());
        let mut queue = FrameQueue::new(32);
        let mut source = ManualSource {
            fail_start: true,
            ..ManualSource::default()
        };

        let err = session.run(&mut queue, &mut source).unwrap_err();

        assert!(matches!(err, CaptureError::SourceFailure(_)));
        assert_eq!(delegate.errors.lock().as_slice(), &[err]);
    }

    #[test]
    fn stalled_source_times_out() {
        let cfg = CaptureConfiguration {
            frame_wait_ms: Some(20),
            ..config(50)
        };
        let mut session = fixed_session(cfg, MemoryRegion::new(4 * BLOCK, BLOCK));
        let mut queue = FrameQueue::new(32);
        let mut source = ManualSource::default();

        let err = session.run(&mut queue, &mut source).unwrap_err();

        assert_eq!(err, CaptureError::SourceStalled { waited_ms: 20 });
        assert!(err.leaves_unsealed_record());
        assert_eq!(source.stops, 1);
    }

    #[test]
    fn failed_frame_write_is_counted_under_continue() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        // Write 1 is the header, write 2 the first frame.
        storage.fail_write_calls = vec![2];
        let mut session = fixed_session(config(50), storage);
        let mut queue = FrameQueue::new(32);

        let report = session.run(&mut queue, &mut PatternSource::new(10)).unwrap();

        assert_eq!(report.frame_write_failures, 1);
        assert!(!report.is_clean());
        assert_eq!(report.bytes_captured, 100);
        let image = session.storage().inner.as_bytes();
        assert!(image[56..76].iter().all(|&b| b == 0xFF));
        assert_eq!(&image[76..156], &ramp_bytes(10, 40)[..]);
    }

    #[test]
    fn failed_frame_write_aborts_under_abort_policy() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        storage.fail_write_calls = vec![2];
        let cfg = CaptureConfiguration {
            frame_error_policy: FrameErrorPolicy::Abort,
            ..config(50)
        };
        let mut session = fixed_session(cfg, storage);
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(10);

        let err = session.run(&mut queue, &mut source).unwrap_err();

        assert_eq!(
            err,
            CaptureError::StorageWriteFailure {
                stage: FailureStage::Sampling,
                reason: "injected write fault".into(),
            }
        );
        assert!(err.leaves_unsealed_record());
        assert_eq!(session.diagnostics().frame_write_failures, 1);
        assert_eq!(source.stops, 1);
    }

    #[test]
    fn stop_failure_still_seals() {
        let mut session = fixed_session(config(50), MemoryRegion::new(4 * BLOCK, BLOCK));
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(10);
        source.fail_stop = true;

        let report = session.run(&mut queue, &mut source).unwrap();

        assert_eq!(report.bytes_captured, 100);
        assert_eq!(source.stops, 1);
        assert!(matches!(session.state(), CaptureState::Completed(_)));
        assert_eq!(
            record::seal_state(session.storage().as_bytes(), FixedHeaderBuilder::SIGNATURE_INDEX, ShortSigner::LEN),
            SealState::Sealed(report.digest.clone())
        );
    }

    #[test]
    fn oversized_frame_is_counted_not_truncated() {
        let mut session = fixed_session(config(50), MemoryRegion::new(4 * BLOCK, BLOCK));
        let mut queue = FrameQueue::new(32);
        let mut source = PatternSource::new(10);
        source.oversized_first = true;

        let report = session.run(&mut queue, &mut source).unwrap();

        assert_eq!(report.frames_rejected, 1);
        assert_eq!(session.diagnostics().frames_rejected, 1);
        assert!(!report.is_clean());
        let image = session.storage().as_bytes();
        assert_eq!(&image[56..156], ramp_bytes(0, 50).as_slice());
    }

    #[test]
    fn finalize_failure_leaves_record_unsealed() {
        let mut session = RecordSession::new(
            config(50),
            FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK)),
            Box::new(UnfinishedSigner(ShortSigner::new())),
            Box::new(FixedHeaderBuilder {
                used_len: 40,
                capacity: 1024,
            }),
        );
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut PatternSource::new(10)).unwrap_err();

        assert_eq!(err, CaptureError::SignatureFinalizeFailure("finalize fault".into()));
        assert_eq!(err.stage(), FailureStage::Finalize);
        assert!(err.leaves_unsealed_record());
        let storage = session.storage();
        assert_eq!(storage.reads, 0);
        assert_eq!(storage.erases, 1);
        // Header plus five frames, no rewrite.
        assert_eq!(storage.writes, 6);
        assert_eq!(
            record::seal_state(storage.inner.as_bytes(), FixedHeaderBuilder::SIGNATURE_INDEX, ShortSigner::LEN),
            SealState::Unsealed
        );
    }

    #[test]
    fn block_erase_failure_is_not_retried() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        // Erase 1 is the pre-erase, erase 2 clears block 0 for the rewrite.
        storage.fail_erase_calls = vec![2];
        let mut session = fixed_session(config(50), storage);
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut PatternSource::new(10)).unwrap_err();

        assert_eq!(
            err,
            CaptureError::StorageEraseFailure {
                stage: FailureStage::BlockErase,
                reason: "injected erase fault".into(),
            }
        );
        assert!(err.leaves_unsealed_record());
        let storage = session.storage();
        assert_eq!(storage.reads, 1);
        assert_eq!(storage.erases, 2);
        assert_eq!(storage.writes, 6);
        assert_eq!(
            record::seal_state(storage.inner.as_bytes(), FixedHeaderBuilder::SIGNATURE_INDEX, ShortSigner::LEN),
            SealState::Unsealed
        );
    }

    #[test]
    fn block_rewrite_failure_is_not_retried() {
        let mut storage = FaultyRegion::new(MemoryRegion::new(4 * BLOCK, BLOCK));
        // Header, five frames, then the block 0 rewrite.
        storage.fail_write_calls = vec![7];
        let mut session = fixed_session(config(50), storage);
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut PatternSource::new(10)).unwrap_err();

        assert_eq!(
            err,
            CaptureError::StorageWriteFailure {
                stage: FailureStage::BlockRewrite,
                reason: "injected write fault".into(),
            }
        );
        assert!(err.leaves_unsealed_record());
        let storage = session.storage();
        assert_eq!(storage.erases, 2);
        assert_eq!(storage.writes, 7);
        assert!(matches!(session.state(), CaptureState::Failed(_)));
    }

    #[test]
    fn concurrent_run_is_rejected() {
        let mut session = fixed_session(config(50), MemoryRegion::new(4 * BLOCK, BLOCK));
        *session.state_handle().lock() = CaptureState::Sealing;
        let mut queue = FrameQueue::new(32);

        let err = session.run(&mut queue, &mut ManualSource::default()).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidState(_)));
    }
}
