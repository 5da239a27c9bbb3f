//! Target-size computation for resize requests
//!
//! Two policies live here. The native policy mirrors libvips/sharp fit
//! semantics (cover crops, contain letterboxes). The canvas policy mirrors
//! what a browser drawing surface does: one uniform ratio, no cropping.
//! Neither enlarges the source unless `allow_upscale` is set.

use crate::models::{ResizeFit, ResizeSpec};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, RgbaImage};

/// How the scaled image is placed into the output box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Output is the scaled image itself.
    Exact,
    /// Scaled image overflows the box and is centre-cropped.
    CropCenter,
    /// Scaled image fits the box and is centred on a transparent background.
    PadCenter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub scaled: (u32, u32),
    pub output: (u32, u32),
    pub placement: Placement,
}

fn scale(dimension: u32, ratio: f64) -> u32 {
    ((f64::from(dimension) * ratio).round() as u32).max(1)
}

fn clamp_ratio(ratio: f64, allow_upscale: bool) -> f64 {
    if allow_upscale {
        ratio
    } else {
        ratio.min(1.0)
    }
}

/// Plan a native resize of a `width`x`height` source. `None` means the
/// image is left untouched.
pub fn plan_native(width: u32, height: u32, spec: &ResizeSpec) -> Option<ResizePlan> {
    let rx = spec.width.map(|w| f64::from(w) / f64::from(width));
    let ry = spec.height.map(|h| f64::from(h) / f64::from(height));
    let up = spec.allow_upscale;

    let plan = match (rx, ry) {
        (None, None) => return None,
        (Some(r), None) | (None, Some(r)) => {
            let r = clamp_ratio(r, up);
            let scaled = (scale(width, r), scale(height, r));
            ResizePlan {
                scaled,
                output: scaled,
                placement: Placement::Exact,
            }
        }
        (Some(rx), Some(ry)) => {
            let (box_w, box_h) = (spec.width.unwrap_or(width), spec.height.unwrap_or(height));
            match spec.fit {
                ResizeFit::Fill => {
                    let scaled = (
                        scale(width, clamp_ratio(rx, up)),
                        scale(height, clamp_ratio(ry, up)),
                    );
                    ResizePlan {
                        scaled,
                        output: scaled,
                        placement: Placement::Exact,
                    }
                }
                ResizeFit::Cover => {
                    let r = clamp_ratio(rx.max(ry), up);
                    let scaled = (scale(width, r), scale(height, r));
                    ResizePlan {
                        scaled,
                        output: (box_w.min(scaled.0), box_h.min(scaled.1)),
                        placement: Placement::CropCenter,
                    }
                }
                ResizeFit::Contain => {
                    let unclamped = rx.min(ry);
                    let r = clamp_ratio(unclamped, up);
                    let scaled = (scale(width, r), scale(height, r));
                    // Without upscaling a small source keeps its own size
                    // rather than being padded out to the box.
                    let output = if r < unclamped { scaled } else { (box_w, box_h) };
                    ResizePlan {
                        scaled,
                        output,
                        placement: Placement::PadCenter,
                    }
                }
                ResizeFit::Inside | ResizeFit::Outside => {
                    let r = if spec.fit == ResizeFit::Inside {
                        rx.min(ry)
                    } else {
                        rx.max(ry)
                    };
                    let r = clamp_ratio(r, up);
                    let scaled = (scale(width, r), scale(height, r));
                    ResizePlan {
                        scaled,
                        output: scaled,
                        placement: Placement::Exact,
                    }
                }
            }
        }
    };

    if plan.output == (width, height) && plan.scaled == (width, height) {
        None
    } else {
        Some(plan)
    }
}

/// Apply a native plan.
pub fn apply_native(image: DynamicImage, plan: &ResizePlan) -> DynamicImage {
    let (scaled_w, scaled_h) = plan.scaled;
    let (out_w, out_h) = plan.output;
    let scaled = if image.dimensions() == plan.scaled {
        image
    } else {
        image.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3)
    };

    match plan.placement {
        Placement::Exact => scaled,
        Placement::CropCenter => {
            let x = (scaled_w - out_w) / 2;
            let y = (scaled_h - out_h) / 2;
            scaled.crop_imm(x, y, out_w, out_h)
        }
        Placement::PadCenter => {
            let mut canvas = RgbaImage::new(out_w, out_h);
            let x = i64::from((out_w - scaled_w.min(out_w)) / 2);
            let y = i64::from((out_h - scaled_h.min(out_h)) / 2);
            imageops::overlay(&mut canvas, &scaled.to_rgba8(), x, y);
            DynamicImage::ImageRgba8(canvas)
        }
    }
}

/// Target size a drawing surface would use for `spec`.
pub fn plan_canvas(width: u32, height: u32, spec: Option<&ResizeSpec>) -> (u32, u32) {
    let Some(spec) = spec else {
        return (width, height);
    };

    let ratio = match (spec.width, spec.height) {
        (Some(w), Some(h)) => {
            let rx = f64::from(w) / f64::from(width);
            let ry = f64::from(h) / f64::from(height);
            if spec.fit == ResizeFit::Contain {
                rx.min(ry)
            } else {
                rx.max(ry)
            }
        }
        (Some(w), None) => f64::from(w) / f64::from(width),
        (None, Some(h)) => f64::from(h) / f64::from(height),
        (None, None) => return (width, height),
    };

    if !spec.allow_upscale && ratio > 1.0 {
        return (width, height);
    }

    match (spec.width, spec.height) {
        (Some(w), None) => (w, scale(height, ratio)),
        (None, Some(h)) => (scale(width, ratio), h),
        _ => (scale(width, ratio), scale(height, ratio)),
    }
}
