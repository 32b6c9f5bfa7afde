fn main() {
    #[cfg(feature = "desktop")]
    {
        #[cfg(target_os = "macos")]
        {
            println!("cargo:rustc-env=MACOSX_DEPLOYMENT_TARGET=10.13");
            std::env::set_var(
                "TAURI_BUNDLE_NSScreenCaptureUsageDescription",
                "Distraction Monitor captures the screen periodically to check whether you are still on task. Captures are classified and discarded; only counters are stored.",
            );
        }

        tauri_build::build()
    }
}
