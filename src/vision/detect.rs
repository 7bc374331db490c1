//! Marker detection: largest connected region per color class.
//!
//! For every class the frame is thresholded into a binary mask, the
//! 8-connected foreground regions are grown with an explicit stack, and the
//! region with the most pixels wins. A winner smaller than the class's
//! `min_area` is noise and reported as absent. The reported position is the
//! centre of the winner's bounding box, not its centre of mass.

use super::hsv::{ColorClass, HsvFrame};
use crate::config::MarkerSettings;
use crate::geometry::Point2D;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a tracked marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// Indicator end of the pointer
    Tip,
    /// Pivot of the pointer
    Axis,
}

impl MarkerKind {
    /// Lowercase name used in logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKind::Tip => "tip",
            MarkerKind::Axis => "axis",
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One connected foreground region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Pixel count
    pub area: u32,
    /// Top-left corner of the bounding box (inclusive)
    pub min: Point2D,
    /// Bottom-right corner of the bounding box (inclusive)
    pub max: Point2D,
}

impl Region {
    /// Centre of the bounding box, rounded down.
    pub fn bbox_center(&self) -> Point2D {
        let w = self.max.x - self.min.x + 1;
        let h = self.max.y - self.min.y + 1;
        Point2D::new(self.min.x + w / 2, self.min.y + h / 2)
    }
}

/// Result of one detection pass: every configured class maps to a position
/// or to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Detections(BTreeMap<MarkerKind, Option<Point2D>>);

impl Detections {
    /// Position of `kind`, if it was found.
    pub fn get(&self, kind: MarkerKind) -> Option<Point2D> {
        self.0.get(&kind).copied().flatten()
    }

    /// `(tip, axis)` when both were found in the same frame.
    pub fn pair(&self) -> Option<(Point2D, Point2D)> {
        Some((self.get(MarkerKind::Tip)?, self.get(MarkerKind::Axis)?))
    }

    /// Iterate over every class, found or not.
    pub fn iter(&self) -> impl Iterator<Item = (MarkerKind, Option<Point2D>)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Stateless detector for a fixed set of color classes.
#[derive(Debug, Clone)]
pub struct MarkerDetector {
    classes: Vec<(MarkerKind, ColorClass)>,
}

impl MarkerDetector {
    /// Detector for the tip and axis classes.
    pub fn new(tip: ColorClass, axis: ColorClass) -> Self {
        Self {
            classes: vec![(MarkerKind::Tip, tip), (MarkerKind::Axis, axis)],
        }
    }

    /// Build from the `[markers]` settings.
    pub fn from_settings(markers: &MarkerSettings) -> Self {
        Self::new(markers.tip, markers.axis)
    }

    /// Locate every configured marker in `image`. Never fails.
    pub fn detect(&self, image: &RgbImage) -> Detections {
        let hsv = HsvFrame::from_rgb(image);
        let found = self
            .classes
            .iter()
            .map(|(kind, class)| (*kind, locate(&hsv, class)))
            .collect();
        Detections(found)
    }
}

/// Position of `class` in an already converted frame.
pub fn locate(frame: &HsvFrame, class: &ColorClass) -> Option<Point2D> {
    let mask = frame.mask(class);
    let region = largest_region(&mask, frame.width(), frame.height())?;
    if region.area < class.min_area {
        return None;
    }
    Some(region.bbox_center())
}

/// Largest 8-connected region of `true` cells in a row-major mask.
pub fn largest_region(mask: &[bool], width: u32, height: u32) -> Option<Region> {
    let (w, h) = (width as usize, height as usize);
    debug_assert_eq!(mask.len(), w * h);

    let mut visited = vec![false; mask.len()];
    let mut stack: Vec<usize> = Vec::new();
    let mut best: Option<Region> = None;

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }

        visited[start] = true;
        stack.push(start);
        let mut area = 0u32;
        let (mut min_x, mut min_y) = (usize::MAX, usize::MAX);
        let (mut max_x, mut max_y) = (0usize, 0usize);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % w, idx / w);
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let n = ny * w + nx;
                    if mask[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        if best.map_or(true, |b| area > b.area) {
            best = Some(Region {
                area,
                min: Point2D::new(min_x as i32, min_y as i32),
                max: Point2D::new(max_x as i32, max_y as i32),
            });
        }
    }

    best
}
