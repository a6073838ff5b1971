//! Stereo engine: two mirrored chains and the per-block update protocol
//!
//! The engine lives on the audio thread. Each `process_block` first
//! consumes the parameter store's change flag; when raised, it re-derives
//! every coefficient set once and installs the same `Arc`s into both
//! channel chains, so the left and right responses are bit-identical and
//! no block can observe a half-applied update. Displaced sets are pushed
//! to a fixed-capacity retirement queue and freed by the control context;
//! the audio thread never runs a deallocation.

use crate::domain::audio::{AudioError, Result};
use crate::domain::chain::{ChainBypass, ChainPosition, FilterChain};
use crate::domain::filter::{BiquadCoeffs, ChainCoefficients, CutCoefficients};
use crate::domain::params::{EqSnapshot, ParameterStore};
use crossbeam::queue::ArrayQueue;
use std::sync::Arc;
use tracing::{debug, info};

/// A coefficient set displaced from a chain slot, awaiting reclamation.
pub enum RetiredCoefficients {
    Peak(Arc<BiquadCoeffs>),
    Cut(Arc<CutCoefficients>),
}

/// Ten Arcs retire per full redesign (five slots, two channels), so this
/// covers dozens of parameter changes between control-context drains.
const RETIREMENT_CAPACITY: usize = 256;

/// Control-context handle that frees superseded coefficient sets.
#[derive(Clone)]
pub struct CoefficientReclaimer {
    queue: Arc<ArrayQueue<RetiredCoefficients>>,
}

impl CoefficientReclaimer {
    /// Drop every pending retired set on the calling thread. Returns the
    /// number reclaimed.
    pub fn drain(&self) -> usize {
        let mut reclaimed = 0;
        while self.queue.pop().is_some() {
            reclaimed += 1;
        }
        if reclaimed > 0 {
            debug!("Reclaimed {} coefficient sets", reclaimed);
        }
        reclaimed
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Two filter chains permanently bound to channels 0 and 1, fed from one
/// parameter store.
pub struct StereoEqEngine {
    params: Arc<ParameterStore>,
    left: FilterChain,
    right: FilterChain,
    sample_rate: f32,
    max_block_len: usize,
    prepared: bool,
    applied: EqSnapshot,
    retired: Arc<ArrayQueue<RetiredCoefficients>>,
}

impl StereoEqEngine {
    pub fn new(params: Arc<ParameterStore>) -> Self {
        Self {
            params,
            left: FilterChain::new(),
            right: FilterChain::new(),
            sample_rate: 0.0,
            max_block_len: 0,
            prepared: false,
            applied: EqSnapshot::default(),
            retired: Arc::new(ArrayQueue::new(RETIREMENT_CAPACITY)),
        }
    }

    /// (Re)initialize for a streaming session. Clears all filter state,
    /// then derives coefficients from the store's current values. Safe to
    /// call again on a sample-rate or block-size change.
    pub fn prepare(&mut self, sample_rate: f32, max_block_len: usize) -> Result<()> {
        if !(sample_rate > 0.0) || max_block_len == 0 {
            return Err(AudioError::InvalidConfiguration(format!(
                "cannot prepare with sample rate {sample_rate} and block size {max_block_len}"
            )));
        }

        self.sample_rate = sample_rate;
        self.max_block_len = max_block_len;
        self.left.reset();
        self.right.reset();

        let snapshot = self.params.snapshot();
        self.install(ChainCoefficients::design(&snapshot, sample_rate));
        self.applied = snapshot;
        // Any raise that happened before prepare is already covered.
        self.params.take_changed();
        self.prepared = true;

        info!("Engine prepared: {} Hz, max block {}", sample_rate, max_block_len);
        Ok(())
    }

    /// Design once and install the same sets into both chains.
    pub fn apply_snapshot(&mut self, snapshot: &EqSnapshot) {
        debug_assert!(self.sample_rate > 0.0, "apply_snapshot before prepare");
        if !(self.sample_rate > 0.0) {
            return;
        }
        self.install(ChainCoefficients::design(snapshot, self.sample_rate));
        self.applied = *snapshot;
    }

    /// One audio callback's worth of work: refresh coefficients if the
    /// store changed, then run each channel's cascade in place.
    ///
    /// Calling before `prepare` is a programming error; release builds
    /// leave the buffers untouched.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert!(self.prepared, "process_block before prepare");
        if !self.prepared {
            return;
        }
        debug_assert_eq!(left.len(), right.len());
        debug_assert!(left.len() <= self.max_block_len);

        if self.params.take_changed() {
            let snapshot = self.params.snapshot();
            // The flag is also raised by writes that round-trip to the
            // value already applied; skip the redesign in that case.
            if snapshot != self.applied {
                self.apply_snapshot(&snapshot);
            }
        }

        self.left.process(left);
        self.right.process(right);
    }

    fn install(&mut self, coeffs: ChainCoefficients) {
        // A displaced set may still be co-owned by the other channel or a
        // response mirror, in which case dropping the queue entry later is
        // just a refcount decrement. force_push keeps the queue bounded if
        // the control context stopped draining.
        let queue = Arc::clone(&self.retired);
        let retire = |set: RetiredCoefficients| {
            let _ = queue.force_push(set);
        };

        retire(RetiredCoefficients::Cut(
            self.left.set_low_cut(Arc::clone(&coeffs.low_cut)),
        ));
        retire(RetiredCoefficients::Cut(
            self.right.set_low_cut(Arc::clone(&coeffs.low_cut)),
        ));

        for (band, peak) in coeffs.peaks.iter().enumerate() {
            retire(RetiredCoefficients::Peak(
                self.left.set_peak(band, Arc::clone(peak)),
            ));
            retire(RetiredCoefficients::Peak(
                self.right.set_peak(band, Arc::clone(peak)),
            ));
        }

        retire(RetiredCoefficients::Cut(
            self.left.set_high_cut(Arc::clone(&coeffs.high_cut)),
        ));
        retire(RetiredCoefficients::Cut(
            self.right.set_high_cut(Arc::clone(&coeffs.high_cut)),
        ));
    }

    /// Handle for the control context to free retired sets.
    pub fn reclaimer(&self) -> CoefficientReclaimer {
        CoefficientReclaimer { queue: Arc::clone(&self.retired) }
    }

    /// Bypass one slot on both channels at once.
    pub fn set_bypassed(&mut self, position: ChainPosition, bypassed: bool) {
        self.left.set_bypassed(position, bypassed);
        self.right.set_bypassed(position, bypassed);
    }

    /// Shared view of the installed sets (both channels hold the same
    /// ones), for response mirrors.
    pub fn coefficients(&self) -> ChainCoefficients {
        self.left.coefficients()
    }

    pub fn bypass(&self) -> ChainBypass {
        self.left.bypass()
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Read-only access to both chains, for consistency checks.
    pub fn chains(&self) -> (&FilterChain, &FilterChain) {
        (&self.left, &self.right)
    }
}
