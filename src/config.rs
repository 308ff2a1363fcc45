use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "https://www.multitran.com";

/// Runtime knobs shared by the translate and crawl pipelines. Built from CLI
/// flags in main; nothing reads globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    /// Zero-based column of the input table holding the word to translate.
    pub translate_column: usize,
    /// Dictionary labels whose blocks are skipped entirely.
    pub excluded_dictionaries: HashSet<String>,
    /// Keep only the recommended row of each block.
    pub recommended_only: bool,
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            translate_column: 0,
            excluded_dictionaries: HashSet::from(["разг.".to_string()]),
            recommended_only: false,
            concurrency: 8,
            timeout: Duration::from_secs(90),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_colloquial() {
        let config = Config::default();
        assert!(config.excluded_dictionaries.contains("разг."));
        assert_eq!(config.translate_column, 0);
    }
}
