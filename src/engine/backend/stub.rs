//! Scripted in-memory host for tests and the diagnostics `simulate` mode.
//!
//! The stub models a small phone-like platform: an always-present earpiece
//! default, a set of connectable external outputs, and a speakerphone
//! toggle. Tests drive it through the connect/disconnect/flip helpers and
//! can inject failures on the mutation path.

use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use super::{
    HostError, HostSignal, HostSignalListener, RawOutput, RouteHost, RouteTarget, SignalGuard,
};
use crate::device::RawOutputKind;

#[derive(Default)]
struct StubState {
    outputs: Vec<RawOutput>,
    active: Option<RawOutput>,
    listener: Option<HostSignalListener>,
    fail_set_active: bool,
    ignore_set_active: bool,
    applied: Vec<RouteTarget>,
}

/// Fully scripted [RouteHost] with injectable failures.
#[derive(Clone, Default)]
pub struct StubRouteHost {
    inner: Arc<Mutex<StubState>>,
}

impl StubRouteHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stub with external outputs already connected.
    pub fn with_outputs(outputs: Vec<RawOutput>) -> Self {
        let host = Self::new();
        host.lock().outputs = outputs;
        host
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        // Stub state is test scaffolding; recover rather than propagate
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn notify(&self, signal: HostSignal) {
        let listener = self.lock().listener.clone();
        if let Some(listener) = listener {
            listener(signal);
        }
    }

    /// Default route when no override is in effect: the first external
    /// output if one is connected, otherwise the earpiece.
    fn default_route(state: &StubState) -> RawOutput {
        state
            .outputs
            .first()
            .cloned()
            .unwrap_or_else(RawOutput::builtin_earpiece)
    }

    // ------------------------------------------------------------------
    // Script helpers
    // ------------------------------------------------------------------

    /// Plug in an external output and fire the plug signal.
    pub fn connect(&self, output: RawOutput) {
        let id = output.id.clone();
        {
            let mut state = self.lock();
            state.outputs.push(output);
        }
        self.notify(HostSignal::DevicesAdded(vec![id]));
    }

    /// Unplug an external output and fire the unplug signal. If it carried
    /// the active route, the route falls back to the default.
    pub fn disconnect(&self, id: &str) {
        {
            let mut state = self.lock();
            state.outputs.retain(|output| output.id != id);
            if state.active.as_ref().is_some_and(|active| active.id == id) {
                state.active = None;
            }
        }
        self.notify(HostSignal::DevicesRemoved(vec![id.to_string()]));
    }

    /// Simulate an unsolicited, external route flip (another app or the OS
    /// itself changed the route underneath the engine).
    pub fn flip_active(&self, output: RawOutput) {
        self.lock().active = Some(output);
        self.notify(HostSignal::RouteChanged);
    }

    /// Fire a bare signal without touching host state.
    pub fn fire(&self, signal: HostSignal) {
        self.notify(signal);
    }

    /// Make every subsequent `set_active`/`clear_active` call fail.
    pub fn set_fail_set_active(&self, fail: bool) {
        self.lock().fail_set_active = fail;
    }

    /// Accept `set_active` calls but leave the route untouched, so the
    /// delayed verification observes a mismatch.
    pub fn set_ignore_set_active(&self, ignore: bool) {
        self.lock().ignore_set_active = ignore;
    }

    /// Routing primitives applied so far, in call order.
    pub fn applied(&self) -> Vec<RouteTarget> {
        self.lock().applied.clone()
    }

    /// The route the stub currently reports as active.
    pub fn current_active(&self) -> RawOutput {
        let state = self.lock();
        state
            .active
            .clone()
            .unwrap_or_else(|| Self::default_route(&state))
    }
}

impl RouteHost for StubRouteHost {
    fn enumerate(&self) -> Result<Vec<RawOutput>, HostError> {
        Ok(self.lock().outputs.clone())
    }

    fn active_output(&self) -> Result<Option<RawOutput>, HostError> {
        let state = self.lock();
        Ok(Some(
            state
                .active
                .clone()
                .unwrap_or_else(|| Self::default_route(&state)),
        ))
    }

    fn set_active(&self, target: &RouteTarget) -> Result<(), HostError> {
        let mut state = self.lock();
        state.applied.push(target.clone());
        if state.fail_set_active {
            return Err(HostError::Platform("injected set_active failure".to_string()));
        }
        if state.ignore_set_active {
            debug!("[StubRouteHost] ignoring set_active({:?})", target);
            return Ok(());
        }
        match target {
            RouteTarget::Speakerphone => {
                state.active = Some(RawOutput::builtin_speaker());
            }
            RouteTarget::Output(id) => {
                let found = state.outputs.iter().find(|output| &output.id == id).cloned();
                match found {
                    Some(output) => state.active = Some(output),
                    None => {
                        return Err(HostError::Platform(format!(
                            "no connected output with id {}",
                            id
                        )))
                    }
                }
            }
        }
        Ok(())
    }

    fn clear_active(&self) -> Result<(), HostError> {
        let mut state = self.lock();
        if state.fail_set_active {
            return Err(HostError::Platform("injected clear_active failure".to_string()));
        }
        state.active = None;
        Ok(())
    }

    fn start_signals(&self, listener: HostSignalListener) -> Result<Box<dyn SignalGuard>, HostError> {
        self.lock().listener = Some(listener);
        Ok(Box::new(StubSignalGuard {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct StubSignalGuard {
    inner: Arc<Mutex<StubState>>,
}

impl SignalGuard for StubSignalGuard {}

impl Drop for StubSignalGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.lock() {
            state.listener = None;
        }
    }
}

/// A Bluetooth SCO output for scripted sessions.
pub fn sco_output(id: &str) -> RawOutput {
    RawOutput::new(id, RawOutputKind::BluetoothSco)
}

/// A wired headset output for scripted sessions.
pub fn wired_output(id: &str) -> RawOutput {
    RawOutput::new(id, RawOutputKind::WiredHeadset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_active_is_earpiece() {
        let host = StubRouteHost::new();
        let active = host.active_output().unwrap().unwrap();
        assert_eq!(active.kind, RawOutputKind::BuiltinEarpiece);
    }

    #[test]
    fn test_connect_emits_added_signal() {
        let host = StubRouteHost::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let _guard = host
            .start_signals(Arc::new(move |signal| {
                if matches!(signal, HostSignal::DevicesAdded(_)) {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .unwrap();

        host.connect(sco_output("bt-1"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(host.enumerate().unwrap().len(), 1);
    }

    #[test]
    fn test_disconnect_active_falls_back() {
        let host = StubRouteHost::with_outputs(vec![sco_output("bt-1")]);
        host.set_active(&RouteTarget::Output("bt-1".to_string()))
            .unwrap();
        host.disconnect("bt-1");
        let active = host.active_output().unwrap().unwrap();
        assert_eq!(active.kind, RawOutputKind::BuiltinEarpiece);
    }

    #[test]
    fn test_guard_drop_deregisters() {
        let host = StubRouteHost::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let guard = host
            .start_signals(Arc::new(move |_| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        drop(guard);

        host.connect(sco_output("bt-1"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ignore_set_active_keeps_route() {
        let host = StubRouteHost::new();
        host.set_ignore_set_active(true);
        host.set_active(&RouteTarget::Speakerphone).unwrap();
        let active = host.active_output().unwrap().unwrap();
        assert_eq!(active.kind, RawOutputKind::BuiltinEarpiece);
        assert_eq!(host.applied().len(), 1);
    }
}
