//! Per-image working state.

use std::mem::size_of;
use std::ops::Range;

use ndarray::{
    concatenate, s, Array1, Array2, Array3, Array4, ArrayView2, ArrayView3, ArrayView4, Axis, Zip,
};
use tracing::debug;

use crate::error::{Error, Result};
use crate::image::resize::{pad_zeros, resample};
use crate::image::{
    blank_hint, chw_to_hwc, compose_hint, crop_padding, ColorImage, Hint, HintTensor,
    ImageTensor, PaddingRecord, RGB_CHANNELS,
};

/// How to turn a generator output on the working canvas back into an image
/// of the source size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
    /// Working canvas `(height, width)`, padding included.
    pub canvas: (usize, usize),
    /// Padding to strip from the bottom and right edges.
    pub padding: PaddingRecord,
    /// Dimensions `(height, width)` of the image passed to `prepare`.
    pub source_dims: (usize, usize),
}

impl OutputLayout {
    /// Convert a `(1, C>=3, H, W)` generator output in `[-1, 1]` to an HWC
    /// image in `[0, 1]` with the source dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the output does not cover the
    /// working canvas with at least three channels.
    pub fn restore(&self, output: ArrayView4<'_, f32>) -> Result<ColorImage> {
        let (batch, channels, height, width) = output.dim();
        if batch == 0 || channels < RGB_CHANNELS || (height, width) != self.canvas {
            return Err(Error::ShapeMismatch {
                expected: format!("(1, 3, {}, {})", self.canvas.0, self.canvas.1),
                actual: format!("{:?}", output.dim()),
            });
        }

        let color = output
            .slice(s![0, ..RGB_CHANNELS, .., ..])
            .mapv(|v| v.mul_add(0.5, 0.5));
        let color = chw_to_hwc(color.view());
        let cropped = crop_padding(color.view(), self.padding)?;

        let (source_height, source_width) = self.source_dims;
        let restored = resample(cropped.view(), source_height, source_width)?;

        Ok(restored.mapv_into(|v| v.clamp(0.0, 1.0)))
    }
}

/// The image tensor, hint tensor and padding of one image in flight.
///
/// The hint always has the image's spatial dimensions. Values are threaded
/// through [`crate::Colorizer::prepare`], [`WorkingSet::with_hint`] and
/// [`crate::Colorizer::colorize`], which consumes it.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    image: ImageTensor,
    hint: HintTensor,
    layout: OutputLayout,
}

impl WorkingSet {
    /// Wrap a resized, padded image tensor with a blank hint.
    pub(crate) fn new(
        image: ImageTensor,
        padding: PaddingRecord,
        source_dims: (usize, usize),
    ) -> Self {
        let (_, _, height, width) = image.dim();
        Self {
            hint: blank_hint(height, width),
            image,
            layout: OutputLayout {
                canvas: (height, width),
                padding,
                source_dims,
            },
        }
    }

    /// Working canvas `(height, width)`. Hints must have these dimensions.
    #[must_use]
    pub const fn canvas_dims(&self) -> (usize, usize) {
        self.layout.canvas
    }

    /// Padding added to reach the canvas.
    #[must_use]
    pub const fn padding(&self) -> PaddingRecord {
        self.layout.padding
    }

    /// Dimensions of the source image.
    #[must_use]
    pub const fn source_dims(&self) -> (usize, usize) {
        self.layout.source_dims
    }

    /// Output restoration parameters.
    #[must_use]
    pub const fn layout(&self) -> OutputLayout {
        self.layout
    }

    /// The `(1, 3, H, W)` image tensor in `[0, 1]`.
    #[must_use]
    pub const fn image(&self) -> &ImageTensor {
        &self.image
    }

    /// The `(1, 4, H, W)` hint tensor: centered color and binary mask.
    #[must_use]
    pub const fn hint(&self) -> &HintTensor {
        &self.hint
    }

    /// Bytes held by the image and hint tensors.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        (self.image.len() + self.hint.len()) * size_of::<f32>()
    }

    /// Replace the hint wholesale. Earlier hints are discarded, not merged.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the hint or mask does not match the canvas.
    pub fn with_hint(mut self, hint: &Hint, mask: ArrayView2<'_, f32>) -> Result<Self> {
        self.set_hint(hint, mask)?;
        Ok(self)
    }

    /// In-place form of [`WorkingSet::with_hint`]; leaves the current hint
    /// untouched on error.
    pub(crate) fn set_hint(&mut self, hint: &Hint, mask: ArrayView2<'_, f32>) -> Result<()> {
        self.hint = compose_hint(hint, mask, self.canvas_dims())?;
        debug!("Hint replaced, {} pixels masked", self.hint.slice(s![0, 3, .., ..]).sum());
        Ok(())
    }

    /// Map a hint and mask drawn over the source image onto the working
    /// canvas, then zero-pad both.
    ///
    /// The mask is reduced block by block rather than filtered, so a stroke
    /// of any width keeps at least one canvas pixel. Each kept pixel takes
    /// the mean hint color of the masked source pixels in its block.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the hint is not RGB or the mask does not
    /// match the hint.
    pub fn fit_hint(
        &self,
        hint: ArrayView3<'_, f32>,
        mask: ArrayView2<'_, f32>,
    ) -> Result<(Array3<f32>, Array2<f32>)> {
        let (hint_height, hint_width, channels) = hint.dim();
        if channels != RGB_CHANNELS {
            return Err(Error::UnsupportedChannels { channels });
        }
        if mask.dim() != (hint_height, hint_width) {
            return Err(Error::HintShapeMismatch {
                expected: (hint_height, hint_width),
                actual: mask.dim(),
            });
        }

        let padding = self.padding();
        let (canvas_height, canvas_width) = self.canvas_dims();
        let (height, width) = (canvas_height - padding.bottom, canvas_width - padding.right);

        let (color, mask) = pool_hint(hint, mask, height, width);
        let color = pad_zeros(color.view(), padding);
        let mask = pad_zeros(mask.insert_axis(Axis(2)).view(), padding).index_axis_move(Axis(2), 0);

        Ok((color, mask))
    }

    /// Concatenate image and hint into the `(1, 7, H, W)` generator input.
    ///
    /// Consumes the working set, so its buffers are freed as soon as the
    /// input is built.
    pub(crate) fn into_generator_input(self) -> Result<(Array4<f32>, OutputLayout)> {
        let input = concatenate(Axis(1), &[self.image.view(), self.hint.view()]).map_err(|err| {
            Error::ShapeMismatch {
                expected: format!(
                    "image {:?} and hint {:?} with equal spatial dims",
                    self.image.dim(),
                    self.hint.dim()
                ),
                actual: err.to_string(),
            }
        })?;

        Ok((input, self.layout))
    }
}

/// Source rows (or columns) covered by target `index` when `source` pixels
/// map onto `target`. Non-empty whenever `source` is.
fn block(index: usize, target: usize, source: usize) -> Range<usize> {
    let start = index * source / target;
    let end = ((index + 1) * source).div_ceil(target).max(start + 1);
    start..end.min(source)
}

/// Reduce an HWC hint and its mask to `(height, width)`.
#[allow(clippy::cast_precision_loss)]
fn pool_hint(
    hint: ArrayView3<'_, f32>,
    mask: ArrayView2<'_, f32>,
    height: usize,
    width: usize,
) -> (Array3<f32>, Array2<f32>) {
    let (source_height, source_width) = mask.dim();
    let mut color = Array3::<f32>::zeros((height, width, RGB_CHANNELS));
    let mut pooled = Array2::<f32>::zeros((height, width));

    for y in 0..height {
        let rows = block(y, height, source_height);
        for x in 0..width {
            let cols = block(x, width, source_width);

            let mut sum = Array1::<f32>::zeros(RGB_CHANNELS);
            let mut count = 0usize;
            Zip::from(mask.slice(s![rows.clone(), cols.clone()]))
                .and(hint.slice(s![rows.clone(), cols, ..]).lanes(Axis(2)))
                .for_each(|&covered, rgb| {
                    if covered > 0.0 {
                        sum += &rgb;
                        count += 1;
                    }
                });

            if count > 0 {
                pooled[[y, x]] = 1.0;
                color.slice_mut(s![y, x, ..]).assign(&(sum / count as f32));
            }
        }
    }

    (color, pooled)
}
