// Copyright (c) The report-ng Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layout comparison contexts and screenshot diffing.
//!
//! A layout check records its result as a custom context on the method: the actual and expected
//! screenshots, plus images produced by the check itself. [`diff_screenshots`] prepares a pair
//! of screenshots of possibly different sizes for an [`ImageDiff`] implementation, which does the
//! pixel-level comparison.

use crate::errors::LayoutDiffError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The directory, relative to the report root, that holds layout screenshots.
pub const SCREENSHOTS_DIR: &str = "screenshots";

/// The result of a layout check, decoded from a method's custom context.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutComparisonContext {
    /// The name of the check.
    #[serde(default)]
    pub name: String,

    /// The comparison mode, for example `pixel` or `annotated`.
    #[serde(default)]
    pub mode: Option<String>,

    /// The measured distance between the screenshots, in percent.
    #[serde(default)]
    pub distance: Option<f64>,

    /// The screenshot taken during the run.
    #[serde(default)]
    pub actual_screenshot: Option<ScreenshotRef>,

    /// The reference screenshot.
    #[serde(default)]
    pub expected_screenshot: Option<ScreenshotRef>,

    /// The difference image produced by the check.
    #[serde(default)]
    pub distance_screenshot: Option<ScreenshotRef>,

    /// The reference screenshot with annotations, if the mode uses them.
    #[serde(default)]
    pub annotated_screenshot: Option<ScreenshotRef>,
}

/// A reference to a screenshot stored in [`SCREENSHOTS_DIR`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ScreenshotRef {
    /// The file name of the screenshot.
    pub filename: String,
}

impl ScreenshotRef {
    /// Returns the path of the screenshot, relative to the report root.
    pub fn path(&self) -> String {
        format!("{SCREENSHOTS_DIR}/{}", self.filename)
    }
}

/// An RGBA image, four bytes per pixel, row by row.
#[derive(Clone, Eq, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Creates a fully transparent buffer.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
        }
    }

    /// Wraps existing RGBA data.
    ///
    /// `which` names the buffer in the error returned if the data doesn't match the dimensions.
    pub fn from_rgba(
        which: &'static str,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, LayoutDiffError> {
        let expected = byte_len(width, height);
        if data.len() != expected {
            return Err(LayoutDiffError::BufferSize {
                which,
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the raw RGBA data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the RGBA value at the given pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = byte_len(self.width, y) + byte_len(x, 1);
        let mut pixel = [0; 4];
        pixel.copy_from_slice(&self.data[offset..offset + 4]);
        Some(pixel)
    }

    // Copies this buffer into the top-left corner of a transparent canvas of the given size.
    fn padded_to(&self, width: u32, height: u32) -> PixelBuffer {
        if (self.width, self.height) == (width, height) {
            return self.clone();
        }
        let mut canvas = PixelBuffer::transparent(width, height);
        let row_len = byte_len(self.width, 1);
        let canvas_row_len = byte_len(width, 1);
        for (y, row) in self.data.chunks_exact(row_len.max(1)).enumerate() {
            let start = y * canvas_row_len;
            canvas.data[start..start + row.len()].copy_from_slice(row);
        }
        canvas
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Options passed to an [`ImageDiff`].
#[derive(Clone, Debug, PartialEq)]
pub struct DiffOptions {
    /// Matching threshold between 0 and 1. Smaller values make the comparison more sensitive.
    pub threshold: f64,

    /// Whether anti-aliased pixels count as differences.
    pub include_aa: bool,

    /// Opacity of unchanged pixels in the diff output.
    pub alpha: f64,

    /// RGB colour of differing pixels in the diff output.
    pub diff_color: [u8; 3],
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            include_aa: true,
            alpha: 0.9,
            diff_color: [246, 168, 33],
        }
    }
}

/// A pixel-level image comparison.
pub trait ImageDiff {
    /// Compares two RGBA images of identical dimensions, writing the diff image to `output`.
    ///
    /// All three slices hold `width * height * 4` bytes. Returns the number of differing pixels.
    fn diff(
        &self,
        actual: &[u8],
        expected: &[u8],
        output: &mut [u8],
        width: u32,
        height: u32,
        options: &DiffOptions,
    ) -> usize;
}

/// The output of [`diff_screenshots`].
#[derive(Clone, Debug)]
pub struct LayoutDiff {
    /// The diff image, sized to fit both screenshots.
    pub diff: PixelBuffer,

    /// The number of pixels that differ.
    pub mismatched_pixels: usize,
}

/// Compares two screenshots that may differ in size.
///
/// Both are padded with transparent pixels to the larger width and the larger height before
/// being handed to `differ`.
pub fn diff_screenshots(
    actual: &PixelBuffer,
    expected: &PixelBuffer,
    differ: &dyn ImageDiff,
    options: &DiffOptions,
) -> LayoutDiff {
    let width = actual.width.max(expected.width);
    let height = actual.height.max(expected.height);

    let actual = actual.padded_to(width, height);
    let expected = expected.padded_to(width, height);
    let mut diff = PixelBuffer::transparent(width, height);

    let mismatched_pixels = differ.diff(
        &actual.data,
        &expected.data,
        &mut diff.data,
        width,
        height,
        options,
    );
    LayoutDiff {
        diff,
        mismatched_pixels,
    }
}
