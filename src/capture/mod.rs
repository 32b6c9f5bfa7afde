// Capture module - produces one snapshot of the display per cycle

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use image::{DynamicImage, ImageOutputFormat};
use tracing::{debug, trace};
use uuid::Uuid;

pub mod scheduler;
#[cfg(feature = "desktop")]
pub mod screen;

#[cfg(feature = "desktop")]
pub use screen::ScreenCapture;

/// Placeholder replaced by the target file in capture commands
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// File name used when the latest capture is kept for debugging
pub const LATEST_CAPTURE_FILE: &str = "capture_latest.png";

/// One timestamped screen capture, PNG encoded
#[derive(Clone)]
pub struct Snapshot {
    pub id: Uuid,
    pub captured_at: DateTime<Local>,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Snapshot {
    /// Downscale to `max_width` if wider, keeping the aspect ratio, and encode
    ///
    /// `captured_at` is the moment of the grab, not the end of encoding.
    pub fn from_image(
        image: DynamicImage,
        max_width: u32,
        captured_at: DateTime<Local>,
    ) -> Result<Self> {
        let image = if image.width() > max_width && max_width > 0 {
            let height = ((image.height() as u64 * max_width as u64) / image.width() as u64).max(1);
            image.resize_exact(max_width, height as u32, image::imageops::FilterType::Triangle)
        } else {
            image
        };

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .context("failed to encode snapshot as PNG")?;

        Ok(Self {
            id: Uuid::new_v4(),
            captured_at,
            png,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Write the PNG to `dir/capture_latest.png`
    pub fn save_latest(&self, dir: &Path) -> Result<()> {
        let path = dir.join(LATEST_CAPTURE_FILE);
        crate::utils::atomic_write(&path, &self.png)
            .with_context(|| format!("failed to write {}", path.display()))
    }

    #[cfg(test)]
    pub fn blank() -> Self {
        Self::from_image(DynamicImage::new_rgb8(8, 8), 64, Local::now()).unwrap()
    }
}

/// Screen capture backend
#[async_trait]
pub trait Capturer: Send + Sync {
    fn name(&self) -> &str;

    async fn capture(&self) -> Result<Snapshot>;
}

/// Captures by running an external screenshot tool into a temp file
pub struct CommandCapture {
    /// Candidate argv lists, tried in order until one succeeds
    commands: Vec<Vec<String>>,
    max_width: u32,
}

impl CommandCapture {
    /// `command` overrides platform detection when set
    pub fn new(command: Option<Vec<String>>, max_width: u32) -> Self {
        let commands = match command {
            Some(command) if !command.is_empty() => vec![command],
            _ => Self::default_commands(),
        };
        Self {
            commands,
            max_width,
        }
    }

    /// Platform screenshot tools
    pub fn default_commands() -> Vec<Vec<String>> {
        let to_argv = |args: &[&str]| args.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        if cfg!(target_os = "macos") {
            // -x: no shutter sound, -C: include the cursor
            vec![to_argv(&["screencapture", "-x", "-C", "-t", "png", OUTPUT_PLACEHOLDER])]
        } else {
            vec![
                to_argv(&["grim", OUTPUT_PLACEHOLDER]),
                to_argv(&["gnome-screenshot", "-f", OUTPUT_PLACEHOLDER]),
                to_argv(&["scrot", "-o", OUTPUT_PLACEHOLDER]),
            ]
        }
    }

    /// Substitute the output path, appending it when there is no placeholder
    fn build_argv(command: &[String], output: &Path) -> Vec<String> {
        let output = output.to_string_lossy();
        let mut argv: Vec<String> = command
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output))
            .collect();
        if !command.iter().any(|arg| arg.contains(OUTPUT_PLACEHOLDER)) {
            argv.push(output.to_string());
        }
        argv
    }

    async fn run(&self, command: &[String], output: &Path) -> Result<()> {
        let argv = Self::build_argv(command, output);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("empty capture command"))?;

        let result = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", program))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(anyhow!("{} exited with {}: {}", program, result.status, stderr.trim()));
        }
        Ok(())
    }
}

#[async_trait]
impl Capturer for CommandCapture {
    fn name(&self) -> &str {
        "command"
    }

    async fn capture(&self) -> Result<Snapshot> {
        let temp_file = tempfile::Builder::new()
            .prefix("screenshot_")
            .suffix(".png")
            .tempfile()
            .context("failed to create temp file for screenshot")?;
        let temp_path = temp_file.path().to_path_buf();

        let mut errors = Vec::new();
        for command in &self.commands {
            match self.run(command, &temp_path).await {
                Ok(()) => {
                    let captured_at = Local::now();
                    let bytes = tokio::fs::read(&temp_path)
                        .await
                        .context("failed to read screenshot file")?;
                    if bytes.is_empty() {
                        errors.push(format!("{}: wrote an empty file", command[0]));
                        continue;
                    }

                    let max_width = self.max_width;
                    let snapshot = tokio::task::spawn_blocking(move || {
                        let image = image::load_from_memory(&bytes)
                            .context("screenshot is not a readable image")?;
                        Snapshot::from_image(image, max_width, captured_at)
                    })
                    .await??;

                    trace!("captured {}x{} with {}", snapshot.width, snapshot.height, command[0]);
                    return Ok(snapshot);
                }
                Err(e) => {
                    debug!("capture command failed: {:#}", e);
                    errors.push(format!("{:#}", e));
                }
            }
        }

        Err(anyhow!("no capture command succeeded: {}", errors.join("; ")))
    }
}
