//! Android routing host backed by android.media.AudioManager over JNI.
//!
//! Requires the Android context to be initialized via `JNI_OnLoad` before
//! any host call. Route mutation uses the speakerphone toggle and the
//! Bluetooth SCO start/stop primitives; everything else (wired, USB) is
//! routed by the OS itself once the speakerphone override is cleared.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use jni::objects::{JObject, JString, JValue};
use jni::JNIEnv;
use log::{debug, warn};

use super::{
    HostError, HostSignal, HostSignalListener, RawOutput, RouteHost, RouteTarget, SignalGuard,
};
use crate::device::RawOutputKind;

// android.media.AudioManager.GET_DEVICES_OUTPUTS
const GET_DEVICES_OUTPUTS: i32 = 2;

// android.media.AudioDeviceInfo.TYPE_* constants
const TYPE_BUILTIN_EARPIECE: i32 = 1;
const TYPE_BUILTIN_SPEAKER: i32 = 2;
const TYPE_WIRED_HEADSET: i32 = 3;
const TYPE_WIRED_HEADPHONES: i32 = 4;
const TYPE_LINE_ANALOG: i32 = 5;
const TYPE_BLUETOOTH_SCO: i32 = 7;
const TYPE_BLUETOOTH_A2DP: i32 = 8;
const TYPE_HDMI: i32 = 9;
const TYPE_USB_DEVICE: i32 = 11;
const TYPE_AUX_LINE: i32 = 19;
const TYPE_BUS: i32 = 21;
const TYPE_USB_HEADSET: i32 = 22;

fn raw_kind_for_type(device_type: i32) -> RawOutputKind {
    match device_type {
        TYPE_BUILTIN_EARPIECE => RawOutputKind::BuiltinEarpiece,
        TYPE_BUILTIN_SPEAKER => RawOutputKind::BuiltinSpeaker,
        TYPE_WIRED_HEADSET => RawOutputKind::WiredHeadset,
        TYPE_WIRED_HEADPHONES => RawOutputKind::WiredHeadphones,
        TYPE_BLUETOOTH_SCO => RawOutputKind::BluetoothSco,
        TYPE_BLUETOOTH_A2DP => RawOutputKind::BluetoothA2dp,
        TYPE_USB_HEADSET => RawOutputKind::UsbHeadset,
        TYPE_USB_DEVICE => RawOutputKind::UsbDevice,
        TYPE_BUS => RawOutputKind::CarAudio,
        TYPE_HDMI => RawOutputKind::Hdmi,
        TYPE_LINE_ANALOG | TYPE_AUX_LINE => RawOutputKind::LineOut,
        _ => RawOutputKind::Other,
    }
}

fn jni_err(err: jni::errors::Error) -> HostError {
    HostError::Platform(format!("JNI call failed: {}", err))
}

/// [RouteHost] implementation for Android.
pub struct AndroidRouteHost {
    poll_interval: Duration,
}

impl AndroidRouteHost {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// Attach to the JVM and run `f` with the env and AudioManager object.
    fn with_audio_manager<T>(
        f: impl FnOnce(&mut JNIEnv, &JObject) -> Result<T, jni::errors::Error>,
    ) -> Result<T, HostError> {
        let ctx = ndk_context::android_context();
        // SAFETY: the VM pointer is installed once by JNI_OnLoad and stays
        // valid for the process lifetime.
        let vm = unsafe { jni::JavaVM::from_raw(ctx.vm().cast()) }.map_err(jni_err)?;
        let mut env = vm.attach_current_thread().map_err(jni_err)?;

        // SAFETY: the context pointer comes from the same ndk-context init.
        let context = unsafe { JObject::from_raw(ctx.context().cast()) };
        let service_name: JString = env.new_string("audio").map_err(jni_err)?;
        let audio_manager = env
            .call_method(
                &context,
                "getSystemService",
                "(Ljava/lang/String;)Ljava/lang/Object;",
                &[JValue::Object(&service_name)],
            )
            .and_then(|value| value.l())
            .map_err(jni_err)?;

        f(&mut env, &audio_manager).map_err(jni_err)
    }

    fn devices(env: &mut JNIEnv, manager: &JObject) -> Result<Vec<RawOutput>, jni::errors::Error> {
        let array = env
            .call_method(
                manager,
                "getDevices",
                "(I)[Landroid/media/AudioDeviceInfo;",
                &[JValue::Int(GET_DEVICES_OUTPUTS)],
            )?
            .l()?;
        let array = jni::objects::JObjectArray::from(array);
        let len = env.get_array_length(&array)?;

        let mut outputs = Vec::with_capacity(len as usize);
        for index in 0..len {
            let info = env.get_object_array_element(&array, index)?;
            let device_type = env.call_method(&info, "getType", "()I", &[])?.i()?;
            let device_id = env.call_method(&info, "getId", "()I", &[])?.i()?;
            outputs.push(RawOutput::new(
                device_id.to_string(),
                raw_kind_for_type(device_type),
            ));
        }
        Ok(outputs)
    }

    fn set_speakerphone(
        env: &mut JNIEnv,
        manager: &JObject,
        on: bool,
    ) -> Result<(), jni::errors::Error> {
        env.call_method(
            manager,
            "setSpeakerphoneOn",
            "(Z)V",
            &[JValue::Bool(u8::from(on))],
        )?;
        Ok(())
    }

    fn set_sco(env: &mut JNIEnv, manager: &JObject, on: bool) -> Result<(), jni::errors::Error> {
        if on {
            env.call_method(manager, "startBluetoothSco", "()V", &[])?;
        } else {
            env.call_method(manager, "stopBluetoothSco", "()V", &[])?;
        }
        env.call_method(
            manager,
            "setBluetoothScoOn",
            "(Z)V",
            &[JValue::Bool(u8::from(on))],
        )?;
        Ok(())
    }

    fn is_speakerphone_on(env: &mut JNIEnv, manager: &JObject) -> Result<bool, jni::errors::Error> {
        env.call_method(manager, "isSpeakerphoneOn", "()Z", &[])?.z()
    }

    fn is_sco_on(env: &mut JNIEnv, manager: &JObject) -> Result<bool, jni::errors::Error> {
        env.call_method(manager, "isBluetoothScoOn", "()Z", &[])?.z()
    }
}

impl Default for AndroidRouteHost {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl RouteHost for AndroidRouteHost {
    fn enumerate(&self) -> Result<Vec<RawOutput>, HostError> {
        Self::with_audio_manager(|env, manager| {
            let outputs = Self::devices(env, manager)?;
            // Built-ins are prepended by the enumerator, not reported here
            Ok(outputs
                .into_iter()
                .filter(|output| {
                    !matches!(
                        output.kind,
                        RawOutputKind::BuiltinSpeaker | RawOutputKind::BuiltinEarpiece
                    )
                })
                .collect())
        })
    }

    fn active_output(&self) -> Result<Option<RawOutput>, HostError> {
        Self::with_audio_manager(|env, manager| {
            if Self::is_speakerphone_on(env, manager)? {
                return Ok(Some(RawOutput::builtin_speaker()));
            }
            let outputs = Self::devices(env, manager)?;
            if Self::is_sco_on(env, manager)? {
                if let Some(sco) = outputs
                    .iter()
                    .find(|output| output.kind == RawOutputKind::BluetoothSco)
                {
                    return Ok(Some(sco.clone()));
                }
            }
            // Wired and USB paths preempt the earpiece automatically
            if let Some(wired) = outputs.iter().find(|output| {
                matches!(
                    output.kind,
                    RawOutputKind::WiredHeadset
                        | RawOutputKind::WiredHeadphones
                        | RawOutputKind::UsbHeadset
                        | RawOutputKind::UsbDevice
                )
            }) {
                return Ok(Some(wired.clone()));
            }
            Ok(Some(RawOutput::builtin_earpiece()))
        })
    }

    fn set_active(&self, target: &RouteTarget) -> Result<(), HostError> {
        match target {
            RouteTarget::Speakerphone => Self::with_audio_manager(|env, manager| {
                Self::set_sco(env, manager, false)?;
                Self::set_speakerphone(env, manager, true)
            }),
            RouteTarget::Output(id) => Self::with_audio_manager(|env, manager| {
                let outputs = Self::devices(env, manager)?;
                let target_kind = outputs
                    .iter()
                    .find(|output| &output.id == id)
                    .map(|output| output.kind);
                match target_kind {
                    Some(RawOutputKind::BluetoothSco) => {
                        Self::set_speakerphone(env, manager, false)?;
                        Self::set_sco(env, manager, true)
                    }
                    Some(_) => {
                        // Wired/USB routing happens by OS policy once the
                        // speakerphone and SCO overrides are cleared
                        Self::set_speakerphone(env, manager, false)?;
                        Self::set_sco(env, manager, false)
                    }
                    None => Ok(()),
                }
            }),
        }
    }

    fn clear_active(&self) -> Result<(), HostError> {
        Self::with_audio_manager(|env, manager| {
            Self::set_speakerphone(env, manager, false)?;
            Self::set_sco(env, manager, false)
        })
    }

    fn start_signals(&self, listener: HostSignalListener) -> Result<Box<dyn SignalGuard>, HostError> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let poll_interval = self.poll_interval;

        thread::spawn(move || {
            let snapshot = || -> Option<(BTreeSet<String>, Option<String>)> {
                Self::with_audio_manager(|env, manager| {
                    let ids = Self::devices(env, manager)?
                        .into_iter()
                        .map(|output| output.id)
                        .collect::<BTreeSet<String>>();
                    Ok(ids)
                })
                .ok()
                .map(|ids| {
                    let active = Self::default().active_output().ok().flatten();
                    (ids, active.map(|output| output.id))
                })
            };

            let mut known = snapshot();
            while !stop_flag.load(Ordering::SeqCst) {
                thread::sleep(poll_interval);
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }

                let current = snapshot();
                let (Some((known_ids, known_active)), Some((current_ids, current_active))) =
                    (&known, &current)
                else {
                    if current.is_none() {
                        warn!("[AndroidRouteHost] device snapshot failed during poll");
                    }
                    known = current;
                    continue;
                };

                let added: Vec<String> = current_ids.difference(known_ids).cloned().collect();
                let removed: Vec<String> = known_ids.difference(current_ids).cloned().collect();
                if !added.is_empty() {
                    listener(HostSignal::DevicesAdded(added));
                }
                if !removed.is_empty() {
                    listener(HostSignal::DevicesRemoved(removed));
                }
                if current_active != known_active {
                    listener(HostSignal::RouteChanged);
                }
                known = current;
            }
            debug!("[AndroidRouteHost] device watcher stopped");
        });

        Ok(Box::new(AndroidSignalGuard { stop }))
    }
}

struct AndroidSignalGuard {
    stop: Arc<AtomicBool>,
}

impl SignalGuard for AndroidSignalGuard {}

impl Drop for AndroidSignalGuard {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
