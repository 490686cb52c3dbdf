// Audio Router Core - call audio output routing engine
// Reconciles the active output route against OS truth and fans route
// state out to listeners

// Module declarations
pub mod api;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod managers;

// Re-exports for convenience
pub use api::*;

#[cfg(target_os = "android")]
use log::info;

cfg_if::cfg_if! {
    if #[cfg(target_os = "android")] {
        /// Initialize Android logging
        pub fn init_logging() {
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;

            match tracing_android::layer("AudioRouter") {
                Ok(layer) => {
                    let _ = tracing_subscriber::registry().with(layer).try_init();
                }
                Err(err) => eprintln!("Failed to init Android tracing: {}", err),
            }
        }
    } else {
        /// Initialize stdout logging for desktop targets
        pub fn init_logging() {
            let _ = tracing_subscriber::fmt().compact().try_init();
        }
    }
}

/// JNI_OnLoad is called when the native library is loaded by Android.
/// It stores the JavaVM so the routing host can reach AudioManager; the
/// plugin registrar installs the application context afterwards via
/// `ndk_context::initialize_android_context` with a real context object.
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging();

    info!("JNI_OnLoad called - registering JavaVM for routing primitives");

    // SAFETY: the VM pointer is guaranteed valid by the Android runtime for
    // the process lifetime; the context slot is filled in by the registrar.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            std::ptr::null_mut(),
        );
    }

    jni::sys::JNI_VERSION_1_6
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_module_structure() {
        // Verify all modules are accessible
        // This ensures the crate compiles with proper module hierarchy
    }
}
