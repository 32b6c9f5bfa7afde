// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(all(feature = "desktop", not(debug_assertions)), windows_subsystem = "windows")]

#[cfg(feature = "desktop")]
fn main() {
    distraction_monitor_lib::run()
}

#[cfg(not(feature = "desktop"))]
fn main() -> std::process::ExitCode {
    match distraction_monitor_lib::headless::run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::ExitCode::FAILURE
        }
    }
}
