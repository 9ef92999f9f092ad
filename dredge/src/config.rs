//! JSON-loadable option bundles.
//!
//! Only what can be written down as plain data lives here: callbacks and
//! template nodes have to be set on [`Options`] directly.

use facet::Facet;
use regex::Regex;

use crate::error::FindError;
use crate::options::{Find, Options, PortionMode, Preset};

/// Serializable subset of [`Options`].
///
/// ```
/// use dredge::FindConfig;
///
/// let config = FindConfig::from_json(r#"{"find": "\\d+", "regex": true, "wrap": "mark"}"#).unwrap();
/// let options = config.into_options().unwrap();
/// ```
#[derive(Debug, Default, Clone, PartialEq, Facet)]
#[facet(default)]
pub struct FindConfig {
    /// Text to look for, or a pattern when `regex` is set.
    pub find: String,
    #[facet(default)]
    pub regex: bool,
    /// Defaults to true.
    #[facet(default)]
    pub global: Option<bool>,
    #[facet(default)]
    pub replace: Option<String>,
    #[facet(default)]
    pub wrap: Option<String>,
    #[facet(default)]
    pub wrap_class: Option<String>,
    /// `"retain"` or `"first"`.
    #[facet(default)]
    pub portion_mode: Option<String>,
    /// `"prose"`.
    #[facet(default)]
    pub preset: Option<String>,
    #[facet(default)]
    pub force_context: Option<bool>,
}

impl FindConfig {
    pub fn from_json(json: &str) -> Result<Self, FindError> {
        facet_json::from_str(json).map_err(|err| FindError::Config {
            message: err.to_string(),
        })
    }

    /// Validate and build the [`Options`] this bundle describes.
    pub fn into_options(self) -> Result<Options<'static>, FindError> {
        if self.find.is_empty() {
            return Err(FindError::Config {
                message: "`find` must not be empty".to_string(),
            });
        }

        let global = self.global.unwrap_or(true);
        let find = match (self.regex, global) {
            (false, true) => Find::Literal(self.find),
            (false, false) => Find::first(Regex::new(&regex::escape(&self.find))?),
            (true, global) => Find::Pattern {
                regex: Regex::new(&self.find)?,
                global,
            },
        };

        let mut options = Options::new(find);
        if let Some(template) = self.replace {
            options = options.replace(template);
        }
        if let Some(tag) = self.wrap {
            options = options.wrap(tag);
        }
        if let Some(class) = self.wrap_class {
            options = options.wrap_class(class);
        }
        if let Some(mode) = self.portion_mode {
            options = options.portion_mode(mode.parse::<PortionMode>()?);
        }
        if let Some(preset) = self.preset {
            options = options.preset(preset.parse::<Preset>()?);
        }
        if let Some(force) = self.force_context {
            options = options.force_context(force);
        }
        Ok(options)
    }
}
