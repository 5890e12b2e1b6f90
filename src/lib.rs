//! # manga-colorizer
//!
//! Colorizes manga pages with a pretrained ONNX generator, optionally guided
//! by a sparse color hint.
//!
//! Each page is denoised, resized so its longer side matches the working
//! size, padded on the bottom/right to a multiple of 32, run through the
//! generator together with a 4-channel hint, and cropped and resized back to
//! its original dimensions.
//!
//! ## Example
//!
//! ```no_run
//! use manga_colorizer::{load_image, Config, InferenceSession};
//!
//! # fn main() -> manga_colorizer::Result<()> {
//! let config = Config::default();
//! let mut session = InferenceSession::from_config(&config)?;
//!
//! let page = load_image("page.png")?;
//! session.set_image(page.view(), &config.prepare_options())?;
//! let colorized = session.colorize()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, ErrorKind, Result};
pub use crate::image::{load_image, save_image, Hint, PaddingRecord};
pub use model::{Denoiser, Device, Generator, ModelPaths};
pub use pipeline::{
    BatchRunner, BatchSummary, Colorizer, Config, InferenceSession, PrepareOptions, WorkingSet,
};
