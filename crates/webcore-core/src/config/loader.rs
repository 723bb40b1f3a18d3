use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::data::{ConfigData, ConfigFormat};
use crate::config::error::ConfigError;
use crate::kernel::constants;

type Result<T> = std::result::Result<T, ConfigError>;

/// A configuration struct that knows its own defaults and environment
/// bindings.
pub trait Configurable: DeserializeOwned {
    /// Values used when neither the file nor the environment sets a key.
    fn defaults() -> ConfigData {
        ConfigData::new()
    }

    /// Explicit `(dotted key, environment variable)` pairs. These win over
    /// every other source.
    fn env_bindings() -> Vec<(&'static str, &'static str)> {
        Vec::new()
    }
}

/// Where environment variables are read from.
pub trait EnvSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Layered configuration loader.
///
/// Precedence, lowest first: [`Configurable::defaults`], the configuration
/// file, automatic environment overrides (`database.host` is read from
/// `DATABASE_HOST`, or `<PREFIX>_DATABASE_HOST` with a prefix), and finally
/// [`Configurable::env_bindings`]. A missing file is not an error.
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env_prefix: Option<String>,
    automatic_env: bool,
    env: Box<dyn EnvSource>,
}

impl ConfigLoader {
    /// A loader with no file, automatic env enabled, reading the process
    /// environment.
    pub fn new() -> Self {
        Self {
            path: None,
            env_prefix: None,
            automatic_env: true,
            env: Box::new(ProcessEnv),
        }
    }

    /// Loader for `config.yaml` in the working directory.
    pub fn with_default_file() -> Self {
        let file = format!("{}.{}", constants::DEFAULT_CONFIG_NAME, constants::DEFAULT_CONFIG_EXT);
        Self::new().with_file(file)
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn with_env<E: EnvSource + 'static>(mut self, env: E) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Disable automatic `A_B` overrides; explicit bindings still apply.
    pub fn without_automatic_env(mut self) -> Self {
        self.automatic_env = false;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bind the merged configuration tree to `T`.
    pub fn load<T: Configurable>(&self) -> Result<T> {
        self.load_data::<T>()?.bind()
    }

    /// The merged tree for `T`, before binding.
    pub fn load_data<T: Configurable>(&self) -> Result<ConfigData> {
        let mut data = T::defaults();
        if let Some(file) = self.read_file()? {
            data.merge(&file);
        }
        self.apply_automatic_env(&mut data)?;
        self.apply_bindings(&mut data, &T::env_bindings())?;
        Ok(data)
    }

    /// Bind the `module.<name>` section to `T`.
    ///
    /// Defaults and explicit bindings of `T` are relative to the section;
    /// automatic env keys keep the full path (`MODULE_<NAME>_<KEY>`).
    pub fn load_module<T: Configurable>(&self, name: &str) -> Result<T> {
        let scope = format!("{}.{}", constants::MODULE_CONFIG_PREFIX, name);

        let mut data = ConfigData::new();
        data.set_value(&scope, T::defaults().into_value())?;
        if let Some(file) = self.read_file()? {
            data.merge(&file);
        }
        self.apply_automatic_env(&mut data)?;

        let mut section = data.section(&scope);
        self.apply_bindings(&mut section, &T::env_bindings())?;
        section.bind()
    }

    fn read_file(&self) -> Result<Option<ConfigData>> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat { path: path.clone() })?;
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Config file {} not found, using defaults and environment", path.display());
                return Ok(None);
            }
            Err(e) => return Err(ConfigError::io(e, path.clone())),
        };
        debug!("Loaded config file {} ({})", path.display(), format);
        ConfigData::deserialize(&contents, format).map(Some)
    }

    fn apply_automatic_env(&self, data: &mut ConfigData) -> Result<()> {
        if !self.automatic_env {
            return Ok(());
        }
        for key in data.leaf_keys() {
            let var = self.env_key(&key);
            if let Some(raw) = self.env.var(&var) {
                trace!("{} = <{}>", key, var);
                let value = coerce(&raw, data.get_value(&key));
                data.set_value(&key, value)?;
            }
        }
        Ok(())
    }

    fn apply_bindings(&self, data: &mut ConfigData, bindings: &[(&'static str, &'static str)]) -> Result<()> {
        for (key, var) in bindings {
            if let Some(raw) = self.env.var(var) {
                trace!("{} = <{}> (bound)", key, var);
                let value = coerce(&raw, data.get_value(key));
                data.set_value(key, value)?;
            }
        }
        Ok(())
    }

    fn env_key(&self, key: &str) -> String {
        let base = key.replace(['.', '-'], "_").to_uppercase();
        match &self.env_prefix {
            Some(prefix) => format!("{}_{}", prefix.to_uppercase(), base),
            None => base,
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("path", &self.path)
            .field("env_prefix", &self.env_prefix)
            .field("automatic_env", &self.automatic_env)
            .finish()
    }
}

/// Convert an environment string to the type of the value it overrides.
/// Unparseable input stays a string and surfaces at bind time.
fn coerce(raw: &str, existing: Option<&Value>) -> Value {
    match existing {
        Some(Value::Bool(_)) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Value::Bool(true),
            "false" | "0" | "no" | "off" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        Some(Value::Number(_)) => match serde_json::from_str::<Value>(raw) {
            Ok(number @ Value::Number(_)) => number,
            _ => Value::String(raw.to_string()),
        },
        Some(Value::Array(_)) => match serde_json::from_str::<Value>(raw) {
            Ok(array @ Value::Array(_)) => array,
            _ => Value::Array(
                raw.split(',')
                    .map(|item| Value::String(item.trim().to_string()))
                    .collect(),
            ),
        },
        _ => Value::String(raw.to_string()),
    }
}
