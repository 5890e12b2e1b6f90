//! Chapter-folder batch processing.
//!
//! Every sub-directory of the input root is a chapter; images directly in the
//! root form an unnamed chapter. Outputs mirror the layout under the output
//! root. A failed page is logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::image::{load_image, load_mask, save_image, ColorImage, Hint};
use crate::model::{Denoiser, Generator};

use super::config::{Config, PrepareOptions};
use super::session::InferenceSession;

/// File extensions treated as pages (case-insensitive).
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

const HINT_SUFFIX: &str = ".hint";
const MASK_SUFFIX: &str = ".mask";

/// A directory of pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Directory name relative to the input root; empty for the root itself.
    pub name: String,
    /// Page paths sorted by file name.
    pub pages: Vec<PathBuf>,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Runs a session over a folder tree.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    options: PrepareOptions,
    vibrancy: f32,
    output_quality: u8,
    show_progress: bool,
}

impl BatchRunner {
    /// Build a runner from the pipeline configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            options: config.prepare_options(),
            vibrancy: config.vibrancy,
            output_quality: config.output_quality,
            show_progress: true,
        }
    }

    /// Enable or disable progress bars.
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Colorize every chapter under `input_root` into `output_root`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the input root cannot be listed or an output
    /// directory cannot be created; page failures are counted instead.
    pub fn run<G: Generator, D: Denoiser>(
        &self,
        session: &mut InferenceSession<G, D>,
        input_root: &Path,
        output_root: &Path,
    ) -> Result<BatchSummary> {
        let start = Instant::now();
        let chapters = find_chapters(input_root)?;
        info!("Found {} chapters in {}", chapters.len(), input_root.display());

        let mut processed = 0;
        let mut failed = 0;

        for chapter in &chapters {
            let output_dir = output_root.join(&chapter.name);
            fs::create_dir_all(&output_dir)?;

            info!("Processing chapter {:?} ({} images)", chapter.name, chapter.pages.len());
            let pb = self.progress_bar(chapter);

            for page in &chapter.pages {
                let Some(file_name) = page.file_name() else {
                    continue;
                };
                let output = output_dir.join(file_name);

                match self.process_page(session, page, &output) {
                    Ok(()) => {
                        processed += 1;
                        info!("Saved {}", output.display());
                    }
                    Err(err) => {
                        failed += 1;
                        warn!("Failed {}: {err}", page.display());
                    }
                }
                pb.inc(1);
            }

            pb.finish_and_clear();
        }

        let summary = BatchSummary {
            processed,
            failed,
            elapsed: start.elapsed(),
        };
        info!(
            "Batch finished: {} saved, {} failed in {}m {}s",
            summary.processed,
            summary.failed,
            summary.elapsed.as_secs() / 60,
            summary.elapsed.as_secs() % 60
        );
        Ok(summary)
    }

    /// Colorize a single page, using `<stem>.hint.*` and `<stem>.mask.*`
    /// beside it as the hint when both exist.
    ///
    /// # Errors
    ///
    /// Returns any load, session or save error.
    pub fn process_page<G: Generator, D: Denoiser>(
        &self,
        session: &mut InferenceSession<G, D>,
        input: &Path,
        output: &Path,
    ) -> Result<()> {
        let sidecars = hint_sidecars(input);
        let hint = sidecars
            .as_ref()
            .map(|(hint, mask)| (hint.as_path(), mask.as_path()));
        self.process_page_with_hint(session, input, hint, output)
    }

    /// Colorize a single page with an explicit hint and mask drawn over it.
    ///
    /// # Errors
    ///
    /// Returns any load, session or save error.
    pub fn process_page_with_hint<G: Generator, D: Denoiser>(
        &self,
        session: &mut InferenceSession<G, D>,
        input: &Path,
        hint: Option<(&Path, &Path)>,
        output: &Path,
    ) -> Result<()> {
        // Read hint files before the page so a bad sidecar leaves the session empty
        let hint = hint
            .map(|(hint_path, mask_path)| {
                Ok::<_, Error>((hint_path, load_image(hint_path)?, load_mask(mask_path)?))
            })
            .transpose()?;

        let image = load_image(input)?;
        session.set_image(image.view(), &self.options)?;
        drop(image);

        if let Some((hint_path, hint, mask)) = hint {
            if let Err(err) = apply_hint(session, &hint, &mask) {
                session.release();
                return Err(err);
            }
            info!("Applied hint {}", hint_path.display());
        }

        let result = session.colorize()?;
        save_image(result.view(), output, self.vibrancy, self.output_quality)
    }

    fn progress_bar(&self, chapter: &Chapter) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(chapter.pages.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(chapter.name.clone());
        pb
    }
}

fn apply_hint<G: Generator, D: Denoiser>(
    session: &mut InferenceSession<G, D>,
    hint: &ColorImage,
    mask: &Array2<f32>,
) -> Result<()> {
    let working = session.working_set().ok_or(Error::NoImageLoaded)?;
    let (color, mask) = working.fit_hint(hint.view(), mask.view())?;
    session.update_hint(&Hint::Unit(color), mask.view())
}

/// List the chapters under `root`, sorted by name, skipping empty ones.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub fn find_chapters(root: &Path) -> Result<Vec<Chapter>> {
    if !root.is_dir() {
        return Err(Error::InvalidParameter {
            name: "input".to_string(),
            reason: format!("{} is not a directory", root.display()),
        });
    }

    let mut chapters = Vec::new();

    let loose = list_pages(root)?;
    if !loose.is_empty() {
        chapters.push(Chapter {
            name: String::new(),
            pages: loose,
        });
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir() && !is_hidden(path))
        .collect();
    dirs.sort();

    for dir in dirs {
        let pages = list_pages(&dir)?;
        if pages.is_empty() {
            continue;
        }
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        chapters.push(Chapter { name, pages });
    }

    Ok(chapters)
}

fn list_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pages: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_page(path))
        .collect();
    pages.sort();
    Ok(pages)
}

/// Whether `path` names a page: a visible image that is not a hint sidecar.
#[must_use]
pub fn is_page(path: &Path) -> bool {
    if is_hidden(path) || !has_image_extension(path) {
        return false;
    }
    let stem = path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    !(stem.ends_with(HINT_SUFFIX) || stem.ends_with(MASK_SUFFIX))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

/// The `<stem>.hint.*` and `<stem>.mask.*` files beside `page`, if both exist.
#[must_use]
pub fn hint_sidecars(page: &Path) -> Option<(PathBuf, PathBuf)> {
    let dir = page.parent()?;
    let stem = page.file_stem()?.to_string_lossy();

    let find = |suffix: &str| {
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{stem}{suffix}.{ext}")))
            .find(|path| path.is_file())
    };

    Some((find(HINT_SUFFIX)?, find(MASK_SUFFIX)?))
}
