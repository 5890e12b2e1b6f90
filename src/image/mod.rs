//! Image loading, tensor layout, resizing, hint composition and saving.

pub mod hint;
mod load;
pub mod resize;
mod save;

pub use hint::{blank_hint, compose_hint, Hint};
pub use load::{load_image, load_mask};
pub use resize::{crop_padding, resize_pad, PaddingRecord};
pub use save::{boost_color, save_image};

use ndarray::{Array3, Array4, ArrayView3, Axis};

/// Image tensor in NCHW format `(1, 3, H, W)` with values in `[0, 1]`.
pub type ImageTensor = Array4<f32>;

/// Hint tensor in NCHW format `(1, 4, H, W)`: three centered color channels
/// followed by the binary mask.
pub type HintTensor = Array4<f32>;

/// Host image in HWC layout with values in `[0, 1]`.
pub type ColorImage = Array3<f32>;

/// The generator's spatial dimensions must be multiples of this.
pub const ALIGNMENT: usize = 32;

/// Default working size of the longer image side.
pub const DEFAULT_SIZE: usize = 576;

/// Default denoiser noise level, on the 0-255 scale.
pub const DEFAULT_DENOISE_SIGMA: u32 = 25;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Number of channels in a hint tensor (RGB + mask).
pub const HINT_CHANNELS: usize = 4;

/// Convert an HWC image to a standard-layout NCHW tensor with a batch of one.
#[must_use]
pub fn hwc_to_nchw(image: ArrayView3<'_, f32>) -> Array4<f32> {
    image
        .permuted_axes([2, 0, 1])
        .insert_axis(Axis(0))
        .as_standard_layout()
        .into_owned()
}

/// Convert a CHW view to a standard-layout HWC image.
#[must_use]
pub fn chw_to_hwc(tensor: ArrayView3<'_, f32>) -> Array3<f32> {
    tensor.permuted_axes([1, 2, 0]).as_standard_layout().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_conversion() {
        let image = Array3::from_shape_fn((2, 3, 3), |(y, x, c)| (y * 100 + x * 10 + c) as f32);
        let tensor = hwc_to_nchw(image.view());

        assert_eq!(tensor.shape(), &[1, 3, 2, 3]);
        assert!(tensor.is_standard_layout());
        assert!((tensor[[0, 2, 1, 0]] - 102.0).abs() < f32::EPSILON);

        let back = chw_to_hwc(tensor.index_axis(Axis(0), 0));
        assert_eq!(back, image);
    }
}
