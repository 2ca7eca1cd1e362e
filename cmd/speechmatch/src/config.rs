//! Configuration file loading.
//!
//! Configuration is stored in ~/.speechmatch/config.yaml unless `--config`
//! names another file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use speechmatch_audio::WavLoader;
use speechmatch_matching::{MatchOptions, RecordingFactory, DEFAULT_NORMALIZER};
use speechmatch_speech::{
    AcousticConfig, AcousticTranscriber, CtcConfig, SidecarTranscriber, Transcriber,
};

/// Default base configuration directory name.
pub const DEFAULT_BASE_DIR: &str = ".speechmatch";
/// Default configuration filename.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Which ASR engine produces transcripts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriberKind {
    /// External CTC acoustic-model binary.
    Acoustic,
    /// Candidates stored next to each audio file as JSON.
    #[default]
    Sidecar,
}

/// ASR engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    pub kind: TranscriberKind,

    /// Acoustic binary path.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub binary: String,

    /// Acoustic model path.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,

    /// Token inventory path.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tokens: String,

    pub beam_width: usize,
    pub max_candidates: usize,
    pub min_token_probability: f32,

    /// Sidecar file extension.
    pub extension: String,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        let ctc = CtcConfig::default();
        Self {
            kind: TranscriberKind::default(),
            binary: String::new(),
            model: String::new(),
            tokens: String::new(),
            beam_width: ctc.beam_width,
            max_candidates: ctc.max_candidates,
            min_token_probability: ctc.min_token_probability,
            extension: "json".to_string(),
        }
    }
}

/// CLI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transcriber: TranscriberConfig,

    /// Normalizer applied to transcript texts.
    pub normalizer: String,

    /// Default matching policy; command-line flags override it.
    pub matching: MatchOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcriber: TranscriberConfig::default(),
            normalizer: DEFAULT_NORMALIZER.to_string(),
            matching: MatchOptions::default(),
        }
    }
}

impl Config {
    /// Gets the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_BASE_DIR).join(DEFAULT_CONFIG_FILE))
    }

    /// Loads `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_file(Path::new(p)),
            None => match Self::default_config_path() {
                Some(p) if p.exists() => Self::load_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Builds the configured transcriber.
    pub fn transcriber(&self) -> Result<Arc<dyn Transcriber>> {
        let t = &self.transcriber;
        match t.kind {
            TranscriberKind::Sidecar => Ok(Arc::new(SidecarTranscriber::with_extension(&t.extension))),
            TranscriberKind::Acoustic => {
                let binary = expand_env(&t.binary);
                let model = expand_env(&t.model);
                let tokens = expand_env(&t.tokens);
                if binary.is_empty() || model.is_empty() || tokens.is_empty() {
                    bail!("acoustic transcriber requires binary, model and tokens");
                }
                Ok(Arc::new(AcousticTranscriber::new(AcousticConfig {
                    binary: binary.into(),
                    model: model.into(),
                    tokens: tokens.into(),
                    decoder: CtcConfig {
                        beam_width: t.beam_width,
                        max_candidates: t.max_candidates,
                        min_token_probability: t.min_token_probability,
                    },
                })))
            }
        }
    }

    /// Builds a recording factory for WAV files.
    pub fn factory(&self) -> Result<RecordingFactory> {
        let factory = RecordingFactory::new(Arc::new(WavLoader::new()), self.transcriber()?)
            .with_normalizer_name(&self.normalizer)?;
        Ok(factory)
    }
}

/// Expands `$VAR` and `${VAR}` references. Unset variables expand to an
/// empty string.
pub fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('$') {
        out.push_str(&rest[..i]);
        let after = &rest[i + 1..];
        let (name, tail) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], &braced[end + 1..]),
                None => {
                    out.push_str(&rest[i..]);
                    return out;
                }
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], &after[end..])
        };
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(name).unwrap_or_default());
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}
