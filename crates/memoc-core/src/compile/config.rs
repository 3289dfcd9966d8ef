//! Configuration for the compilation driver.

/// Environment variable holding whitespace-separated base options.
pub const OPTIONS_ENV: &str = "MEMOC_OPTIONS";

/// Configuration for the compiler.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Options passed to every compilation, before per-call class-path entries
    pub options: Vec<String>,

    /// Trace warnings and notes of successful compilations
    pub log_diagnostics: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            options: Vec::new(),
            log_diagnostics: true,
        }
    }
}

impl CompilerConfig {
    /// Config with the given base options.
    pub fn with_options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Config with base options read from `MEMOC_OPTIONS`.
    pub fn from_env() -> Self {
        match std::env::var(OPTIONS_ENV) {
            Ok(value) => {
                let options = parse_options(&value);
                tracing::debug!("Using {} base options from {}", options.len(), OPTIONS_ENV);
                Self::with_options(options)
            }
            Err(_) => Self::default(),
        }
    }

    /// Append one option.
    pub fn option(mut self, option: impl Into<String>) -> Self {
        self.options.push(option.into());
        self
    }

    /// Append a `-cp` flag with the given entries.
    pub fn class_path<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries: Vec<String> = entries
            .into_iter()
            .map(|e| e.as_ref().to_string())
            .collect();
        self.options.push(super::options::CLASS_PATH_FLAG.to_string());
        self.options
            .push(entries.join(&super::options::PATH_SEPARATOR.to_string()));
        self
    }

    /// Treat warnings as errors.
    pub fn deny_warnings(self) -> Self {
        self.option("-Werror")
    }

    /// Drop warnings entirely.
    pub fn quiet(mut self) -> Self {
        self.log_diagnostics = false;
        self.option("-nowarn")
    }
}

/// Split an options string on whitespace.
pub fn parse_options(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
