use std::{
    path::PathBuf,
    str::FromStr,
};

pub const DISABLE_CACHE_VAR: &str = "EMBERS_BIND_DISABLE_CACHE";
pub const DUMP_DIR_VAR: &str = "EMBERS_BIND_DUMP_DIR";
pub const THREAD_GROUP_SIZE_VAR: &str = "EMBERS_BIND_THREAD_GROUP_SIZE";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOptions {
    /// Reuse resolved calls with the same signature.
    pub cache_enabled: bool,

    /// If set, every generated kernel is written to this directory.
    pub dump_dir: Option<PathBuf>,

    pub thread_group_size: u32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            dump_dir: None,
            thread_group_size: 32,
        }
    }
}

impl CallOptions {
    /// Defaults, overridden by `EMBERS_BIND_*` environment variables.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();

        if let Some(value) = var(DISABLE_CACHE_VAR) {
            options.cache_enabled = !parse_flag(&value);
        }
        if let Some(dir) = var(DUMP_DIR_VAR).filter(|dir| !dir.is_empty()) {
            options.dump_dir = Some(dir.into());
        }
        if let Some(size) = var(THREAD_GROUP_SIZE_VAR)
            .and_then(|value| parse::<u32>(&value))
            .filter(|size| *size > 0)
        {
            options.thread_group_size = size;
        }

        options
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache_enabled = false;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes" | "on")
}

fn parse<T: FromStr>(value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(value, "ignoring invalid option value");
            None
        }
    }
}
