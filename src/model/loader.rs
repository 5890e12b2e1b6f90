//! Model path resolution, device selection and ONNX session loading.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::Session;

use crate::error::{Error, Result};

/// Types of models used in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Colorization generator.
    Generator,
    /// FFDNet-style denoiser.
    Denoiser,
}

impl ModelType {
    /// Get the filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::Generator => "generator.onnx",
            Self::Denoiser => "denoiser.onnx",
        }
    }
}

/// Compute device the ONNX sessions run on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    /// Plain CPU execution.
    Cpu,
    /// NVIDIA GPU (requires the `cuda` feature).
    Cuda,
    /// Apple Neural Engine / GPU (requires the `coreml` feature).
    CoreMl,
    /// Every compiled-in accelerator, falling back to CPU.
    #[default]
    Auto,
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" | "mps" => Ok(Self::CoreMl),
            "auto" => Ok(Self::Auto),
            other => Err(Error::InvalidParameter {
                name: "device".to_string(),
                reason: format!("unknown device {other:?}, expected cpu, cuda, coreml or auto"),
            }),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::CoreMl => "coreml",
            Self::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl Device {
    /// Execution providers to register for this device.
    ///
    /// An empty list leaves ONNX Runtime on its default CPU provider.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly requested accelerator was not
    /// compiled in.
    pub fn execution_providers(self) -> Result<Vec<ExecutionProviderDispatch>> {
        let providers = match self {
            Self::Cpu => Vec::new(),
            Self::Cuda => vec![cuda_provider()
                .ok_or_else(|| not_compiled_in(self, "cuda"))?
                .error_on_failure()],
            Self::CoreMl => vec![coreml_provider()
                .ok_or_else(|| not_compiled_in(self, "coreml"))?
                .error_on_failure()],
            Self::Auto => [cuda_provider(), coreml_provider()]
                .into_iter()
                .flatten()
                .collect(),
        };
        Ok(providers)
    }
}

fn not_compiled_in(device: Device, feature: &str) -> Error {
    Error::InvalidParameter {
        name: "device".to_string(),
        reason: format!("{device} requested but the `{feature}` feature is not enabled"),
    }
}

#[cfg(feature = "cuda")]
fn cuda_provider() -> Option<ExecutionProviderDispatch> {
    Some(ort::execution_providers::CUDAExecutionProvider::default().build())
}

#[cfg(not(feature = "cuda"))]
const fn cuda_provider() -> Option<ExecutionProviderDispatch> {
    None
}

#[cfg(feature = "coreml")]
fn coreml_provider() -> Option<ExecutionProviderDispatch> {
    Some(ort::execution_providers::CoreMLExecutionProvider::default().build())
}

#[cfg(not(feature = "coreml"))]
const fn coreml_provider() -> Option<ExecutionProviderDispatch> {
    None
}

/// Locations of the two model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Generator weights.
    pub generator: PathBuf,
    /// Denoiser weights.
    pub denoiser: PathBuf,
}

impl ModelPaths {
    /// Both models under `dir`, with their default file names.
    #[must_use]
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            generator: dir.join(ModelType::Generator.filename()),
            denoiser: dir.join(ModelType::Denoiser.filename()),
        }
    }

    /// Platform model directory:
    /// - Windows: `%APPDATA%\manga-colorizer\models`
    /// - Linux: `~/.local/share/manga-colorizer/models`
    /// - macOS: `~/Library/Application Support/manga-colorizer/models`
    #[must_use]
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("manga-colorizer")
            .join("models")
    }
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self::in_dir(Self::default_dir())
    }
}

/// Load an ONNX model session bound to `device`.
///
/// # Errors
///
/// Returns an error if the file is missing or the model cannot be loaded.
pub fn load_session(path: &Path, device: Device) -> Result<Session> {
    if !path.is_file() {
        return Err(Error::ModelNotFound {
            path: path.to_path_buf(),
        });
    }

    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let providers = device.execution_providers()?;

    tracing::info!("Loading {name} on {device}");

    let mut builder = Session::builder().map_err(|source| Error::ModelLoad {
        name: name.clone(),
        source,
    })?;

    if !providers.is_empty() {
        builder = builder
            .with_execution_providers(providers)
            .map_err(|source| Error::ModelLoad {
                name: name.clone(),
                source,
            })?;
    }

    builder
        .commit_from_file(path)
        .map_err(|source| Error::ModelLoad { name, source })
}
