//! Processor registry and factory for cadence pipelines.
//!
//! This crate provides a centralized registry for discovering and
//! instantiating processors by a stable type tag. Pipeline files and
//! command-line specs name processors by tag; the registry turns a tag plus
//! string parameters into a boxed [`Processor`].
//!
//! # Features
//!
//! - **Processor Discovery**: List all available processors with metadata
//! - **Factory Pattern**: Create processors by tag at runtime
//! - **Role Filtering**: Analyzers, transcoders and graphers
//! - **Parameter Info**: Names, defaults and descriptions for help output
//!
//! # Example
//!
//! ```rust
//! use cadence_registry::{Params, ProcessorRegistry};
//! use cadence_core::Role;
//!
//! let registry = ProcessorRegistry::new();
//!
//! for descriptor in registry.all_processors() {
//!     println!("{}: {}", descriptor.id, descriptor.description);
//! }
//!
//! let level = registry
//!     .create("level", &Params::new().with("block_size", "2048"))
//!     .unwrap();
//! assert_eq!(level.role(), Role::Analyzer);
//! ```
//!
//! The registry is populated once at construction. There is no global
//! instance and no way to patch entries at runtime.

mod params;

pub use params::{Params, parse_param_value};

use std::path::PathBuf;

use cadence_analysis::{
    ColorScheme, LevelMeter, SilenceSegmenter, SpectralCentroid, SpectrogramConfig,
    SpectrogramGrapher, WaveformConfig, WaveformGrapher, Window,
};
use cadence_core::{ChannelMixer, LinearResampler, Processor, Role, Transcode};
use cadence_io::WavEncoder;

/// Errors from processor construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No processor is registered under this tag.
    #[error("unknown processor type '{0}'")]
    UnknownProcessor(String),

    /// The processor has no parameter with this name.
    #[error("{processor} has no parameter '{param}'")]
    UnknownParameter {
        /// Processor type tag.
        processor: String,
        /// Offending parameter name.
        param: String,
    },

    /// A required parameter is missing.
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),

    /// A parameter value could not be used.
    #[error("invalid value for '{param}': {message}")]
    InvalidValue {
        /// Parameter name.
        param: String,
        /// What was wrong.
        message: String,
    },
}

impl RegistryError {
    /// Creates an [`RegistryError::InvalidValue`].
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.into(),
            message: message.into(),
        }
    }
}

/// Describes one parameter of a registered processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDescriptor {
    /// Parameter name as written in specs and config files.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Default value, or `None` if the parameter is required or optional
    /// without a default.
    pub default: Option<&'static str>,
    /// Whether the parameter must be given.
    pub required: bool,
}

impl ParamDescriptor {
    const fn optional(name: &'static str, description: &'static str, default: &'static str) -> Self {
        Self {
            name,
            description,
            default: Some(default),
            required: false,
        }
    }

    const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            default: None,
            required: true,
        }
    }

    const fn unset(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            default: None,
            required: false,
        }
    }
}

/// Describes a processor in the registry.
#[derive(Debug, Clone)]
pub struct ProcessorDescriptor {
    /// Unique type tag (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of the processor.
    pub description: &'static str,
    /// Role the processor takes in a graph.
    pub role: Role,
    /// Accepted parameters.
    pub params: &'static [ParamDescriptor],
}

impl ProcessorDescriptor {
    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Factory function type for creating processors.
type ProcessorFactory = fn(&Params) -> Result<Box<dyn Processor>, RegistryError>;

/// Internal entry in the registry.
struct RegistryEntry {
    descriptor: ProcessorDescriptor,
    factory: ProcessorFactory,
}

/// Registry of all available processors.
///
/// All built-in processors are registered by [`ProcessorRegistry::new`].
pub struct ProcessorRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.descriptor.id))
            .finish()
    }
}

const LEVEL_PARAMS: &[ParamDescriptor] = &[ParamDescriptor::optional(
    "block_size",
    "Analysis block in sample frames",
    "1024",
)];

const CENTROID_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::optional("fft_size", "FFT window in sample frames", "2048"),
    ParamDescriptor::optional(
        "window",
        "Window function: hann, hamming, blackman, rectangular",
        "hann",
    ),
];

const SILENCE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::optional("threshold", "Silence threshold in dB", "-60"),
    ParamDescriptor::optional("hop", "Hop window in sample frames", "1024"),
];

const WAVEFORM_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::optional("width", "Image width in pixels", "500"),
    ParamDescriptor::optional("height", "Image height in pixels", "101"),
    ParamDescriptor::optional("fft_size", "FFT size for column colouring", "2048"),
    ParamDescriptor::optional("scheme", "Colour scheme: default, iso, purple", "default"),
    ParamDescriptor::unset("output", "PPM image path"),
];

const SPECTROGRAM_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::optional("width", "Image width in pixels", "500"),
    ParamDescriptor::optional("height", "Image height in pixels", "256"),
    ParamDescriptor::optional("fft_size", "FFT size per column", "2048"),
    ParamDescriptor::optional("range", "Dynamic range in dB", "120dB"),
    ParamDescriptor::optional("scheme", "Colour scheme: default, iso, purple", "default"),
    ParamDescriptor::unset("output", "PPM image path"),
];

const WAV_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::required("path", "Output file"),
    ParamDescriptor::optional("bits", "Bit depth: 16, 24 or 32 (float)", "16"),
];

const MIX_PARAMS: &[ParamDescriptor] = &[ParamDescriptor::optional(
    "channels",
    "Output channel count",
    "1",
)];

const RESAMPLE_PARAMS: &[ParamDescriptor] = &[ParamDescriptor::required(
    "rate",
    "Output sample rate in Hz",
)];

fn parse_window(value: &str) -> Result<Window, RegistryError> {
    match value.to_lowercase().as_str() {
        "hann" | "hanning" => Ok(Window::Hann),
        "hamming" => Ok(Window::Hamming),
        "blackman" => Ok(Window::Blackman),
        "rectangular" | "rect" | "none" => Ok(Window::Rectangular),
        _ => Err(RegistryError::invalid(
            "window",
            format!("'{value}' is not a valid window (use: hann, hamming, blackman, rectangular)"),
        )),
    }
}

impl ProcessorRegistry {
    /// Create a new registry with all built-in processors registered.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(8),
        };
        registry.register_builtin_processors();
        registry
    }

    /// Register all built-in processors.
    fn register_builtin_processors(&mut self) {
        self.register(
            ProcessorDescriptor {
                id: "level",
                name: "Level Meter",
                description: "Per-block RMS and peak level",
                role: Role::Analyzer,
                params: LEVEL_PARAMS,
            },
            |p| Ok(Box::new(LevelMeter::new(p.count("block_size", LevelMeter::DEFAULT_BLOCK)?))),
        );

        self.register(
            ProcessorDescriptor {
                id: "centroid",
                name: "Spectral Centroid",
                description: "Per-window spectral centroid in Hz and log-normalized",
                role: Role::Analyzer,
                params: CENTROID_PARAMS,
            },
            |p| {
                let fft_size = p.count("fft_size", SpectralCentroid::DEFAULT_FFT_SIZE)?;
                if fft_size < 2 {
                    return Err(RegistryError::invalid("fft_size", "must be at least 2"));
                }
                let window = parse_window(p.get("window").unwrap_or("hann"))?;
                Ok(Box::new(SpectralCentroid::with_window(fft_size, window)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "silence",
                name: "Silence Segmenter",
                description: "Labels the stream as sound or silence segments",
                role: Role::Analyzer,
                params: SILENCE_PARAMS,
            },
            |p| {
                let threshold = p.number(
                    "threshold",
                    f64::from(SilenceSegmenter::DEFAULT_THRESHOLD_DB),
                )?;
                let hop = p.count("hop", SilenceSegmenter::DEFAULT_HOP)?;
                Ok(Box::new(SilenceSegmenter::new(threshold as f32, hop)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "waveform",
                name: "Waveform",
                description: "Per-pixel peaks coloured by spectral centroid, optional PPM image",
                role: Role::Grapher,
                params: WAVEFORM_PARAMS,
            },
            |p| {
                let defaults = WaveformConfig::default();
                let config = WaveformConfig {
                    width: p.count("width", defaults.width)?,
                    height: p.count("height", defaults.height)?,
                    fft_size: p.count("fft_size", defaults.fft_size)?,
                    scheme: p.parsed::<ColorScheme>("scheme", defaults.scheme)?,
                    output: p.get("output").map(PathBuf::from),
                };
                Ok(Box::new(WaveformGrapher::new(config)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "spectrogram",
                name: "Spectrogram",
                description: "Log-frequency spectrogram columns, optional PPM image",
                role: Role::Grapher,
                params: SPECTROGRAM_PARAMS,
            },
            |p| {
                let defaults = SpectrogramConfig::default();
                let range = p.number("range", f64::from(defaults.range_db))?;
                if range <= 0.0 {
                    return Err(RegistryError::invalid("range", "must be positive"));
                }
                let config = SpectrogramConfig {
                    width: p.count("width", defaults.width)?,
                    height: p.count("height", defaults.height)?,
                    fft_size: p.count("fft_size", defaults.fft_size)?,
                    range_db: range as f32,
                    scheme: p.parsed::<ColorScheme>("scheme", defaults.scheme)?,
                    output: p.get("output").map(PathBuf::from),
                };
                Ok(Box::new(SpectrogramGrapher::new(config)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "wav",
                name: "WAV Writer",
                description: "Transcodes the stream to a WAV file",
                role: Role::Transcoder,
                params: WAV_PARAMS,
            },
            |p| {
                let path = p.text("path")?;
                let bits = p.count("bits", 16)?;
                if !matches!(bits, 16 | 24 | 32) {
                    return Err(RegistryError::invalid(
                        "bits",
                        format!("{bits} is not a supported depth (use: 16, 24, 32)"),
                    ));
                }
                Ok(Box::new(Transcode::new(Box::new(WavEncoder::new(
                    path,
                    bits as u16,
                )))))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "mix",
                name: "Channel Mixer",
                description: "Converts the channel count (average to mono, duplicate, truncate)",
                role: Role::Transcoder,
                params: MIX_PARAMS,
            },
            |p| {
                let channels = p.count("channels", 1)?;
                let channels = u16::try_from(channels)
                    .map_err(|_| RegistryError::invalid("channels", "too many channels"))?;
                Ok(Box::new(ChannelMixer::new(channels)))
            },
        );

        self.register(
            ProcessorDescriptor {
                id: "resample",
                name: "Linear Resampler",
                description: "Converts the sample rate by linear interpolation",
                role: Role::Transcoder,
                params: RESAMPLE_PARAMS,
            },
            |p| {
                p.text("rate")?;
                let rate = p.count("rate", 1)?;
                let rate = u32::try_from(rate)
                    .map_err(|_| RegistryError::invalid("rate", "sample rate out of range"))?;
                Ok(Box::new(LinearResampler::new(rate)))
            },
        );
    }

    /// Register a processor with the registry.
    fn register(&mut self, descriptor: ProcessorDescriptor, factory: ProcessorFactory) {
        self.entries.push(RegistryEntry {
            descriptor,
            factory,
        });
    }

    /// Returns descriptors for all registered processors.
    pub fn all_processors(&self) -> Vec<&ProcessorDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for processors with a specific role.
    pub fn processors_with_role(&self, role: Role) -> Vec<&ProcessorDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.role == role)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by type tag.
    pub fn get(&self, id: &str) -> Option<&ProcessorDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Returns `true` if a processor is registered under `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Create a processor instance by type tag.
    ///
    /// Every parameter must be one the descriptor declares. Values are
    /// validated by the processor's factory.
    pub fn create(&self, id: &str, params: &Params) -> Result<Box<dyn Processor>, RegistryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .ok_or_else(|| RegistryError::UnknownProcessor(id.to_string()))?;
        if let Some((param, _)) = params
            .iter()
            .find(|(name, _)| entry.descriptor.param(name).is_none())
        {
            return Err(RegistryError::UnknownParameter {
                processor: id.to_string(),
                param: param.to_string(),
            });
        }
        let processor = (entry.factory)(params)?;
        tracing::debug!(kind = id, params = params.len(), "registry_create");
        Ok(processor)
    }

    /// Returns the number of registered processors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no processors are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = ProcessorRegistry::new();
        assert_eq!(registry.len(), 8);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_get_processor() {
        let registry = ProcessorRegistry::new();

        let level = registry.get("level");
        assert!(level.is_some());
        assert_eq!(level.unwrap().name, "Level Meter");

        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_processors_by_role() {
        let registry = ProcessorRegistry::new();
        assert_eq!(registry.processors_with_role(Role::Analyzer).len(), 3);
        assert_eq!(registry.processors_with_role(Role::Transcoder).len(), 3);
        assert_eq!(registry.processors_with_role(Role::Grapher).len(), 2);
        assert!(registry.processors_with_role(Role::Decoder).is_empty());
    }

    #[test]
    fn test_created_processors_match_descriptors() {
        let registry = ProcessorRegistry::new();
        let required = Params::new()
            .with("path", "unused.wav")
            .with("rate", "22.05kHz");

        for descriptor in registry.all_processors() {
            let params: Params = descriptor
                .params
                .iter()
                .filter(|p| p.required)
                .filter_map(|p| required.get(p.name).map(|v| (p.name, v)))
                .collect();
            let processor = registry
                .create(descriptor.id, &params)
                .unwrap_or_else(|e| panic!("failed to create {}: {e}", descriptor.id));
            assert_eq!(processor.role(), descriptor.role, "{}", descriptor.id);
        }
    }

    #[test]
    fn test_params_reach_processor() {
        let registry = ProcessorRegistry::new();
        let level = registry
            .create("level", &Params::new().with("block_size", "2048"))
            .unwrap();
        assert_eq!(level.block_size(), Some(2048));
    }

    #[test]
    fn test_unknown_processor_and_param() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.create("reverb", &Params::new()),
            Err(RegistryError::UnknownProcessor(_))
        ));
        assert!(matches!(
            registry.create("level", &Params::new().with("drive", "3")),
            Err(RegistryError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_invalid_values() {
        let registry = ProcessorRegistry::new();
        assert!(matches!(
            registry.create("wav", &Params::new()),
            Err(RegistryError::MissingParameter(_))
        ));
        assert!(matches!(
            registry.create("wav", &Params::new().with("path", "a.wav").with("bits", "12")),
            Err(RegistryError::InvalidValue { .. })
        ));
        assert!(
            registry
                .create("centroid", &Params::new().with("window", "triangle"))
                .is_err()
        );
        assert!(
            registry
                .create("waveform", &Params::new().with("scheme", "neon"))
                .is_err()
        );
        assert!(
            registry
                .create("resample", &Params::new().with("rate", "fast"))
                .is_err()
        );
        assert!(
            registry
                .create("spectrogram", &Params::new().with("range", "-20dB"))
                .is_err()
        );
    }

    #[test]
    fn test_spectrogram_params_reach_processor() {
        let registry = ProcessorRegistry::new();
        let grapher = registry
            .create(
                "spectrogram",
                &Params::new().with("fft_size", "1024").with("range", "90dB"),
            )
            .unwrap();
        assert_eq!(grapher.role(), Role::Grapher);
        let params = grapher.params();
        assert_eq!(params["fft_size"], "1024");
        assert_eq!(params["range"], "90");
        assert!(!params.contains_key("output"));
    }

    #[test]
    fn test_descriptor_params() {
        let registry = ProcessorRegistry::new();
        let wav = registry.get("wav").unwrap();
        assert!(wav.param("path").unwrap().required);
        assert_eq!(wav.param("bits").unwrap().default, Some("16"));
        assert!(wav.param("gain").is_none());
    }
}
