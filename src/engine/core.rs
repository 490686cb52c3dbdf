//! RouteEngine: the audio route reconciliation core.
//!
//! Owns the canonical route state {available devices, selected device},
//! serializes user-initiated route requests against OS change signals,
//! verifies that requested changes took effect, and fans consistent
//! snapshots out to listeners. One engine instance is shared by all plugin
//! owners; lifecycle is reference-counted so the first acquire performs
//! setup and the last release performs teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::api::{RouteEvent, RouteSnapshot};
use crate::config::RouterConfig;
use crate::device::{
    classify_active, AudioDevice, DeviceEnumerator, DeviceKind, FilterProfile, RawOutputKind,
    BUILTIN_RECEIVER_ID, BUILTIN_SPEAKER_ID,
};
use crate::engine::backend::{HostSignal, RawOutput, RouteHost, RouteTarget};
use crate::engine::observer::RouteObserver;
use crate::error::{log_route_error, RouteError};
use crate::managers::{ListenerHandle, ListenerRegistry};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// Message processed by the serialized reconciliation worker.
///
/// OS signals and deferred verifications both funnel through this channel,
/// so every mutation of route state happens in one ordered domain.
#[derive(Debug)]
pub(crate) enum EngineMsg {
    /// A change signal from the platform host.
    Signal(HostSignal),
    /// Arm the delayed verification for a just-issued request.
    ScheduleVerify { generation: u64, delay: Duration },
    /// The delayed verification fired.
    Verify { generation: u64 },
}

/// A route-change request awaiting OS verification.
///
/// Cleared on verified success, on a superseding request, or on
/// external-device preemption. The generation distinguishes otherwise
/// identical requests so a stale verification can detect supersession.
#[derive(Debug, Clone)]
struct PendingRequest {
    target: String,
    generation: u64,
    issued_at: Instant,
}

struct EngineState {
    owners: usize,
    available: Vec<AudioDevice>,
    selected: Option<AudioDevice>,
    pending: Option<PendingRequest>,
    next_generation: u64,
    listeners: ListenerRegistry,
    observer: Option<RouteObserver>,
    /// Set while the engine itself holds the speakerphone override, so
    /// teardown can restore the OS setting it mutated.
    speaker_engaged: bool,
    last_emitted: Option<RouteSnapshot>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            owners: 0,
            available: Vec::new(),
            selected: None,
            pending: None,
            next_generation: 0,
            listeners: ListenerRegistry::new(),
            observer: None,
            speaker_engaged: false,
            last_emitted: None,
        }
    }
}

/// State and policy shared between the public handle and the worker.
struct EngineShared {
    host: Arc<dyn RouteHost>,
    config: RouterConfig,
    state: Mutex<EngineState>,
}

/// The route reconciliation engine.
///
/// An explicit, injectable value: callers receive it by reference (the FFI
/// glue keeps one process-wide instance) rather than reaching for ambient
/// global state.
pub struct RouteEngine {
    shared: Arc<EngineShared>,
    events_tx: mpsc::UnboundedSender<EngineMsg>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineMsg>>>,
    worker_started: AtomicBool,
}

impl RouteEngine {
    /// Create an engine over a platform host. No OS interaction happens
    /// until the first [RouteEngine::acquire].
    pub fn new(host: Arc<dyn RouteHost>, config: RouterConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(EngineShared {
                host,
                config,
                state: Mutex::new(EngineState::new()),
            }),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            worker_started: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Register an owner. The 0 -> 1 transition performs one-time setup:
    /// the worker starts, the host signal subscription is registered
    /// (exactly once per activation, regardless of owner count) and route
    /// state is built from OS truth.
    pub fn acquire(&self) -> Result<(), RouteError> {
        let mut state = self.shared.lock_state().map_err(|err| {
            log_route_error(&err, "acquire");
            err
        })?;

        state.owners += 1;
        if state.owners > 1 {
            debug!("[RouteEngine] acquire: owner count now {}", state.owners);
            return Ok(());
        }

        info!("[RouteEngine] first acquire, activating");
        self.init_worker();

        let observer = RouteObserver::register(&self.shared.host, self.events_tx.clone())
            .map_err(|err| {
                state.owners = 0;
                let err = RouteError::AudioManager {
                    details: err.to_string(),
                };
                log_route_error(&err, "acquire");
                err
            })?;
        state.observer = Some(observer);

        self.shared.reconcile_locked(&mut state);
        Ok(())
    }

    /// Deregister an owner. The 1 -> 0 transition tears down: the signal
    /// subscription is dropped, listeners and pending request are cleared,
    /// and any speakerphone override the engine applied is restored.
    /// Calling release when the count is already 0 is a safe no-op.
    pub fn release(&self) -> Result<(), RouteError> {
        let mut state = self.shared.lock_state().map_err(|err| {
            log_route_error(&err, "release");
            err
        })?;

        if state.owners == 0 {
            debug!("[RouteEngine] release with no owners, ignoring");
            return Ok(());
        }

        state.owners -= 1;
        if state.owners > 0 {
            debug!("[RouteEngine] release: owner count now {}", state.owners);
            return Ok(());
        }

        info!("[RouteEngine] last release, deactivating");
        state.observer = None;

        if state.speaker_engaged {
            if let Err(err) = self.shared.host.clear_active() {
                warn!("[RouteEngine] failed to restore speaker state: {}", err);
            }
            state.speaker_engaged = false;
        }

        state.listeners.clear();
        state.pending = None;
        state.available.clear();
        state.selected = None;
        state.last_emitted = None;
        Ok(())
    }

    // ========================================================================
    // REQUESTS
    // ========================================================================

    /// Request a route change to the device with the given id.
    ///
    /// Built-in targets map directly to an OS primitive; external targets
    /// must be present in the current enumeration. On success a pending
    /// request is armed and a delayed verification re-checks OS truth; a
    /// newer request supersedes any in-flight one.
    pub fn request_device(&self, device_id: &str) -> Result<(), RouteError> {
        let mut state = self.shared.lock_state().map_err(|err| {
            log_route_error(&err, "request_device");
            err
        })?;

        if state.owners == 0 {
            let err = RouteError::NotInitialized;
            log_route_error(&err, "request_device");
            return Err(err);
        }

        let target = self.shared.resolve_target(device_id).map_err(|err| {
            log_route_error(&err, "request_device");
            err
        })?;

        let applied = match &target {
            Some(RouteTarget::Speakerphone) => self.shared.host.set_active(&RouteTarget::Speakerphone),
            Some(output @ RouteTarget::Output(_)) => self.shared.host.set_active(output),
            // Receiver: drop the override, OS default policy applies
            None => self.shared.host.clear_active(),
        };

        if let Err(host_err) = applied {
            let err = RouteError::AudioManager {
                details: host_err.to_string(),
            };
            log_route_error(&err, "request_device");
            // State must reflect actual OS truth, never the unfulfilled
            // desired state
            self.shared.reconcile_locked(&mut state);
            return Err(err);
        }

        state.speaker_engaged = matches!(target, Some(RouteTarget::Speakerphone));

        let generation = state.next_generation;
        state.next_generation += 1;
        state.pending = Some(PendingRequest {
            target: device_id.to_string(),
            generation,
            issued_at: Instant::now(),
        });
        debug!(
            "[RouteEngine] request {} armed (generation {})",
            device_id, generation
        );

        self.shared.reconcile_locked(&mut state);

        let delay = Duration::from_millis(self.shared.config.routing.verify_delay_ms);
        let _ = self.events_tx.send(EngineMsg::ScheduleVerify { generation, delay });
        Ok(())
    }

    /// List currently available output devices under a filter profile.
    ///
    /// Read-only and side-effect-free; valid whether or not the engine is
    /// acquired.
    pub fn list_available_devices(
        &self,
        filter: FilterProfile,
    ) -> Result<Vec<AudioDevice>, RouteError> {
        DeviceEnumerator::new(Arc::clone(&self.shared.host)).list(filter)
    }

    // ========================================================================
    // LISTENERS
    // ========================================================================

    /// Register a listener. The current snapshot is delivered immediately
    /// to this listener only, so a new subscriber never starts without
    /// initial state.
    pub fn subscribe(
        &self,
    ) -> Result<(ListenerHandle, mpsc::UnboundedReceiver<RouteEvent>), RouteError> {
        let mut state = self.shared.lock_state().map_err(|err| {
            log_route_error(&err, "subscribe");
            err
        })?;

        let (handle, rx) = state.listeners.subscribe();
        let snapshot = EngineShared::compose_snapshot(&state);
        state
            .listeners
            .send_to(handle, RouteEvent::Snapshot { state: snapshot });
        Ok((handle, rx))
    }

    /// Remove a listener. Unknown or already-removed handles are a no-op.
    pub fn unsubscribe(&self, handle: ListenerHandle) -> Result<(), RouteError> {
        let mut state = self.shared.lock_state().map_err(|err| {
            log_route_error(&err, "unsubscribe");
            err
        })?;
        state.listeners.unsubscribe(handle);
        Ok(())
    }

    // ========================================================================
    // WORKER
    // ========================================================================

    /// Start the serialized reconciliation worker. Idempotent; the worker
    /// persists across release/acquire cycles (messages arriving while the
    /// engine has no owners are dropped by the owner-count guard).
    fn init_worker(&self) {
        if self
            .worker_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let Some(mut events_rx) = self
            .events_rx
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .take()
        else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let events_tx = self.events_tx.clone();

        // Dedicated thread with its own runtime: host callbacks may arrive
        // from arbitrary threads and no ambient runtime is guaranteed when
        // the engine is embedded behind FFI
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create Tokio runtime for route worker");

            rt.block_on(async move {
                while let Some(msg) = events_rx.recv().await {
                    match msg {
                        EngineMsg::Signal(signal) => shared.handle_signal(signal),
                        EngineMsg::ScheduleVerify { generation, delay } => {
                            let tx = events_tx.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(delay).await;
                                let _ = tx.send(EngineMsg::Verify { generation });
                            });
                        }
                        EngineMsg::Verify { generation } => shared.verify_pending(generation),
                    }
                }
            });
        });
    }
}

impl EngineShared {
    fn lock_state(&self) -> Result<MutexGuard<'_, EngineState>, RouteError> {
        self.state.lock().map_err(|_| RouteError::LockPoisoned {
            component: "route_state".to_string(),
        })
    }

    /// Translate a requested device id to a platform routing primitive.
    /// `None` means "clear the override" (the receiver target).
    fn resolve_target(&self, device_id: &str) -> Result<Option<RouteTarget>, RouteError> {
        match device_id {
            BUILTIN_SPEAKER_ID => Ok(Some(RouteTarget::Speakerphone)),
            BUILTIN_RECEIVER_ID => Ok(None),
            _ => {
                let outputs = self.host.enumerate().map_err(|err| RouteError::AudioManager {
                    details: err.to_string(),
                })?;
                let known = DeviceEnumerator::available_from(&outputs, self.config.routing.filter_profile)
                    .iter()
                    .any(|device| device.id == device_id);
                if !known {
                    return Err(RouteError::InvalidDevice {
                        device_id: device_id.to_string(),
                    });
                }
                Ok(Some(RouteTarget::Output(device_id.to_string())))
            }
        }
    }

    /// Process one host signal on the worker.
    fn handle_signal(&self, signal: HostSignal) {
        let Ok(mut state) = self.lock_state() else {
            warn!("[RouteEngine] state lock poisoned, dropping signal");
            return;
        };
        if state.owners == 0 {
            // Signal raced teardown
            return;
        }
        debug!("[RouteEngine] host signal: {:?}", signal);
        // Signals are triggers only; reconciliation re-queries OS truth
        // rather than trusting the payload
        self.reconcile_locked(&mut state);
    }

    /// The delayed verification for one request generation fired.
    fn verify_pending(&self, generation: u64) {
        let Ok(mut state) = self.lock_state() else {
            warn!("[RouteEngine] state lock poisoned, dropping verification");
            return;
        };
        if state.owners == 0 {
            return;
        }

        let Some(pending) = state.pending.clone() else {
            // Confirmed or preempted before the delay elapsed
            return;
        };
        if pending.generation != generation {
            // Superseded by a newer request; this verification is a no-op
            debug!(
                "[RouteEngine] stale verification for generation {} (current {})",
                generation, pending.generation
            );
            return;
        }

        let active = self.query_active();
        if active_matches_target(&active, &pending.target) {
            debug!(
                "[RouteEngine] request {} verified after {:?}",
                pending.target,
                pending.issued_at.elapsed()
            );
            state.pending = None;
            self.reconcile_locked(&mut state);
            return;
        }

        warn!(
            "[RouteEngine] request {} not applied by platform (active: {:?})",
            pending.target, active
        );
        state.pending = None;
        state.listeners.broadcast(RouteEvent::RoutingError {
            message: format!(
                "route change to '{}' was not applied by the platform",
                pending.target
            ),
        });
        // Fall back to whatever the OS actually settled on
        self.reconcile_locked(&mut state);
    }

    fn query_active(&self) -> Option<RawOutput> {
        match self.host.active_output() {
            Ok(active) => active,
            Err(err) => {
                warn!("[RouteEngine] active-output query failed: {}", err);
                None
            }
        }
    }

    /// The reconciliation decision procedure: recompute canonical route
    /// state from authoritative OS queries and emit a snapshot if it
    /// changed.
    fn reconcile_locked(&self, state: &mut EngineState) {
        let filter = self.config.routing.filter_profile;

        let outputs = match self.host.enumerate() {
            Ok(outputs) => outputs,
            Err(err) => {
                warn!("[RouteEngine] enumeration failed, keeping prior state: {}", err);
                return;
            }
        };

        let mut available = DeviceEnumerator::available_from(&outputs, filter);
        let external = DeviceEnumerator::first_external(&outputs, filter);
        let mut active = self.query_active();

        // Speaker mode is mutually exclusive with an externally connected
        // device: never report speaker-active while one is present
        if external.is_some() && active_is_speaker(&active) {
            match self.host.clear_active() {
                Ok(()) => {
                    state.speaker_engaged = false;
                    active = self.query_active();
                }
                Err(err) => {
                    warn!("[RouteEngine] failed to force speaker off: {}", err);
                    active = None;
                }
            }
        }

        if let Some(pending) = state.pending.take() {
            let confirmed = active_matches_target(&active, &pending.target);
            let preempted = external
                .as_ref()
                .is_some_and(|device| device.id != pending.target);
            if confirmed || preempted {
                debug!(
                    "[RouteEngine] pending {} cleared ({})",
                    pending.target,
                    if confirmed { "confirmed" } else { "preempted" }
                );
            } else {
                state.pending = Some(pending);
            }
        }

        let selected = if let Some(device) = external {
            Some(device)
        } else if let Some(pending) = &state.pending {
            // Optimistic selection while the OS settles, to avoid flicker
            device_for_target(&pending.target, &available).or_else(|| active_device(&active))
        } else {
            active_device(&active)
        };

        // A non-built-in selection always appears in the availability list
        // of the same snapshot, even when the profile would hide it
        if let Some(device) = &selected {
            if !device.is_builtin() && !available.iter().any(|other| other.id == device.id) {
                available.push(device.clone());
            }
        }

        state.available = available;
        state.selected = selected;
        self.emit_locked(state);
    }

    fn compose_snapshot(state: &EngineState) -> RouteSnapshot {
        RouteSnapshot {
            available_devices: state.available.clone(),
            selected_device: state.selected.clone(),
        }
    }

    /// Broadcast the current snapshot unless it matches the last one every
    /// listener has already observed.
    fn emit_locked(&self, state: &mut EngineState) {
        let snapshot = Self::compose_snapshot(state);
        if state.last_emitted.as_ref() == Some(&snapshot) {
            return;
        }
        state.last_emitted = Some(snapshot.clone());
        state.listeners.broadcast(RouteEvent::Snapshot { state: snapshot });
    }
}

/// Whether the OS-reported active output is the built-in speaker.
fn active_is_speaker(active: &Option<RawOutput>) -> bool {
    active
        .as_ref()
        .is_some_and(|output| output.kind == RawOutputKind::BuiltinSpeaker)
}

/// Whether the OS-reported active output satisfies a requested target id.
fn active_matches_target(active: &Option<RawOutput>, target: &str) -> bool {
    match target {
        BUILTIN_SPEAKER_ID => active_is_speaker(active),
        BUILTIN_RECEIVER_ID => match active {
            // No reported route means the implicit default, the receiver
            None => true,
            Some(output) => output.kind == RawOutputKind::BuiltinEarpiece,
        },
        _ => active.as_ref().is_some_and(|output| output.id == target),
    }
}

/// Device shown as selected for a pending target id.
fn device_for_target(target: &str, available: &[AudioDevice]) -> Option<AudioDevice> {
    match target {
        BUILTIN_SPEAKER_ID => Some(AudioDevice::builtin_speaker()),
        BUILTIN_RECEIVER_ID => Some(AudioDevice::builtin_receiver()),
        _ => available.iter().find(|device| device.id == target).cloned(),
    }
}

/// Map the OS-reported active output to a canonical device. Built-in paths
/// collapse onto the reserved ids; anything the table cannot name surfaces
/// as `unknown` rather than an empty selection.
fn active_device(active: &Option<RawOutput>) -> Option<AudioDevice> {
    let output = active.as_ref()?;
    let kind = classify_active(output.kind);
    let device = match kind {
        DeviceKind::BuiltinSpeaker => AudioDevice::builtin_speaker(),
        DeviceKind::BuiltinReceiver => AudioDevice::builtin_receiver(),
        _ => AudioDevice::new(output.id.clone(), kind),
    };
    Some(device)
}

// ========================================================================
// TEST HELPERS
// ========================================================================

#[cfg(test)]
impl RouteEngine {
    /// Current pending target and generation, if a request is in flight.
    pub(crate) fn pending_for_test(&self) -> Option<(String, u64)> {
        self.shared
            .lock_state()
            .ok()
            .and_then(|state| {
                state
                    .pending
                    .as_ref()
                    .map(|pending| (pending.target.clone(), pending.generation))
            })
    }

    /// Run a verification pass synchronously, bypassing the delay.
    pub(crate) fn verify_now_for_test(&self, generation: u64) {
        self.shared.verify_pending(generation);
    }

    /// Number of registered listeners.
    pub(crate) fn listener_count_for_test(&self) -> usize {
        self.shared
            .lock_state()
            .map(|state| state.listeners.len())
            .unwrap_or(0)
    }
}
