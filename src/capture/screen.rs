// Native multi-display capture through the `screenshots` crate

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Local;
use image::{imageops, DynamicImage};
use screenshots::display_info::DisplayInfo;
use screenshots::Screen;
use tracing::{info, trace, warn};

use super::{Capturer, Snapshot};

/// Grabs every display and composites them by display geometry
pub struct ScreenCapture {
    max_width: u32,
}

impl ScreenCapture {
    pub fn new(max_width: u32) -> Result<Self> {
        let screens = Screen::all()?;
        if screens.is_empty() {
            return Err(anyhow!("no displays found"));
        }
        info!("detected {} displays", screens.len());
        for (index, screen) in screens.iter().enumerate() {
            let display_info = screen.display_info;
            info!(
                "display #{}: {}x{} @ ({}, {})",
                index, display_info.width, display_info.height, display_info.x, display_info.y
            );
        }
        Ok(Self { max_width })
    }

    fn grab(max_width: u32) -> Result<Snapshot> {
        // displays can be plugged in or out between captures
        let screens = Screen::all()?;
        let mut captures = Vec::new();

        for (index, screen) in screens.iter().enumerate() {
            match screen.capture() {
                Ok(image) => {
                    captures.push((screen.display_info, DynamicImage::ImageRgba8(image)));
                    trace!("captured display #{}", index);
                }
                Err(err) => {
                    warn!("failed to capture display #{}: {}", index, err);
                }
            }
        }

        if captures.is_empty() {
            return Err(anyhow!("no display could be captured"));
        }
        let captured_at = Local::now();

        Snapshot::from_image(combine_screens(captures)?, max_width, captured_at)
    }
}

#[async_trait]
impl Capturer for ScreenCapture {
    fn name(&self) -> &str {
        "screen"
    }

    async fn capture(&self) -> Result<Snapshot> {
        let max_width = self.max_width;
        tokio::task::spawn_blocking(move || Self::grab(max_width)).await?
    }
}

/// Place each capture on one canvas at its display position
fn combine_screens(captures: Vec<(DisplayInfo, DynamicImage)>) -> Result<DynamicImage> {
    struct Region {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        image: DynamicImage,
    }

    let mut regions: Vec<Region> = Vec::with_capacity(captures.len());

    for (info, image) in captures {
        let (img_w, img_h) = (image.width(), image.height());

        // physical pixels per logical point
        let mut scale = if info.width > 0 {
            img_w as f32 / info.width as f32
        } else {
            info.scale_factor
        };
        if !scale.is_finite() || scale <= 0.0 {
            scale = 1.0;
        }

        regions.push(Region {
            x: ((info.x as f32) * scale).round() as i64,
            y: ((info.y as f32) * scale).round() as i64,
            width: img_w,
            height: img_h,
            image,
        });
    }

    let min_x = regions.iter().map(|r| r.x).min().unwrap_or(0);
    let min_y = regions.iter().map(|r| r.y).min().unwrap_or(0);
    let max_x = regions
        .iter()
        .map(|r| r.x + r.width as i64)
        .max()
        .unwrap_or(min_x);
    let max_y = regions
        .iter()
        .map(|r| r.y + r.height as i64)
        .max()
        .unwrap_or(min_y);

    let canvas_width = (max_x - min_x).max(0) as u32;
    let canvas_height = (max_y - min_y).max(0) as u32;
    if canvas_width == 0 || canvas_height == 0 {
        return Err(anyhow!("displays report an empty area"));
    }

    let mut canvas = DynamicImage::new_rgba8(canvas_width, canvas_height);
    for region in regions {
        imageops::overlay(&mut canvas, &region.image, region.x - min_x, region.y - min_y);
    }

    Ok(canvas)
}
