use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Codec settings shared by the encoder and the decoder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Render `<`, `>` and `&` in strings as `\u` escapes instead of literally.
    /// Inside an `OrderedMap` the outermost map's own flag applies instead.
    pub escape_html: bool,
    /// Pretty-print with this indent per nesting level; compact when `None`.
    pub indent: Option<String>,
    /// Deepest array/object nesting accepted by either direction.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            escape_html: true,
            indent: None,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    pub const CONFIG_FILE: &'static str = "ordmap.toml";
    pub const ENV_PREFIX: &'static str = "ORDMAP_";
    pub const DEFAULT_MAX_DEPTH: usize = 128;

    pub fn with_escape_html(mut self, on: bool) -> Self {
        self.escape_html = on;
        self
    }

    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = Some(indent.into());
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Defaults, then `ordmap.toml` if present, then `ORDMAP_*` variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(Self::CONFIG_FILE))
            .merge(Env::prefixed(Self::ENV_PREFIX))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self> {
        Ok(figment.extract()?)
    }

    pub fn load() -> Result<Self> {
        Self::from_figment(&Self::figment())
    }
}
