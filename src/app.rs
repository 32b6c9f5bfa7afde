//! Desktop application startup
//!
//! - logging with webview forwarding
//! - controller bootstrap on the Tauri runtime
//! - event forwarding to the webview
//! - tray icon menu
//! - clean shutdown on exit

use std::path::PathBuf;
use std::sync::Arc;

use tauri::menu::{Menu, MenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{AppHandle, Emitter, Manager, RunEvent};
use tracing::{error, info, warn};

use crate::commands::*;
use crate::event_bus::EventBus;
use crate::models::StartRequest;
use crate::notifier::tauri::TRAY_ID;
use crate::notifier::TauriNotifier;
use crate::{logger, paths, AppState};

const MENU_TOGGLE: &str = "toggle";
const MENU_STATS: &str = "stats";
const MENU_EXIT: &str = "exit";

/// Application entry point
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let data_dir = paths::default_data_dir();

    let log_broadcaster = Arc::new(logger::LogBroadcaster::new());
    // held until the process exits so buffered lines are flushed
    let _log_guard =
        match logger::init_with_broadcaster(&paths::log_dir(&data_dir), log_broadcaster.clone()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("failed to initialise logging: {:#}", e);
                None
            }
        };

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(move |app| {
            info!("starting distraction monitor...");
            log_broadcaster.set_app_handle(app.handle().clone());

            let state = build_state(app.handle(), data_dir.clone(), log_broadcaster.clone())?;
            build_tray(app)?;
            app.manage(state);
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            start_monitoring,
            stop_monitoring,
            get_monitor_status,
            lock_task,
            unlock_task,
            get_stats_summary,
            get_app_config,
            update_config,
            submit_reflection,
            get_log_dir,
            open_log_folder,
            exit_app,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app.try_state::<AppState>() {
                let controller = state.controller.clone();
                if let Err(e) = tauri::async_runtime::block_on(controller.shutdown()) {
                    error!("shutdown on exit failed: {}", e);
                }
            }
        }
    });
}

fn build_state(
    app: &AppHandle,
    data_dir: PathBuf,
    log_broadcaster: Arc<logger::LogBroadcaster>,
) -> Result<AppState, String> {
    let events = Arc::new(EventBus::new(256));
    let notifier = Arc::new(TauriNotifier::new(app.clone()));

    let controller = tauri::async_runtime::block_on(crate::bootstrap(
        &data_dir,
        notifier.clone(),
        events.clone(),
    ))
    .map_err(|e| {
        error!("failed to start: {:#}", e);
        format!("{:#}", e)
    })?;

    let config = tauri::async_runtime::block_on(controller.config());
    log_broadcaster.set_enabled(config.logger_settings.enable_frontend_logging);

    let handle = app.clone();
    let mut receiver = events.subscribe();
    tauri::async_runtime::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = handle.emit(event.name(), &event) {
                        warn!("failed to forward {}: {}", event.name(), e);
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("webview missed {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    Ok(AppState {
        controller,
        notifier,
        log_broadcaster,
        data_dir,
    })
}

fn build_tray(app: &tauri::App) -> tauri::Result<()> {
    let toggle = MenuItem::with_id(app, MENU_TOGGLE, "Start/Stop Monitoring", true, None::<&str>)?;
    let stats = MenuItem::with_id(app, MENU_STATS, "Show Statistics", true, None::<&str>)?;
    let exit = MenuItem::with_id(app, MENU_EXIT, "Exit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&toggle, &stats, &exit])?;

    let mut tray = TrayIconBuilder::with_id(TRAY_ID)
        .menu(&menu)
        .tooltip("Distraction Monitor")
        .on_menu_event(|app, event| match event.id.as_ref() {
            MENU_TOGGLE => {
                let app = app.clone();
                tauri::async_runtime::spawn(async move { toggle_monitoring(&app).await });
            }
            MENU_STATS => {
                let app = app.clone();
                tauri::async_runtime::spawn(async move { show_statistics(&app).await });
            }
            MENU_EXIT => {
                info!("exit requested from the tray");
                app.exit(0);
            }
            _ => {}
        });

    if let Some(icon) = app.default_window_icon().cloned() {
        tray = tray.icon(icon);
    }
    tray.build(app)?;
    Ok(())
}

async fn toggle_monitoring(app: &AppHandle) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    let controller = state.controller.clone();

    if controller.status().await.state.is_idle() {
        if let Err(e) = controller.start(StartRequest::default()).await {
            warn!("tray start rejected: {}", e);
        }
    } else if let Err(e) = controller.stop().await {
        error!("tray stop failed: {}", e);
    }
}

async fn show_statistics(app: &AppHandle) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    let summary = state.controller.stats_summary().await;

    if let Some(window) = app.get_webview_window("main") {
        let _ = window.show();
        let _ = window.set_focus();
    }
    if let Err(e) = app.emit("show-statistics", summary) {
        warn!("failed to show statistics: {}", e);
    }
}
