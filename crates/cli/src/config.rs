//! REPL presentation settings, loaded from an optional TOML file. Absence of
//! the file (the common case) is not an error — defaults apply. This never
//! affects file-mode compilation or language semantics.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    pub prompt: String,
    /// Log the compiled size of each REPL line at `trace` level before
    /// running it. Off by default; only visible at all when `COPPER_LOG` is
    /// set, since it goes through `tracing`, not stdout.
    pub trace_bytecode_size: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig { prompt: "> ".to_string(), trace_bytecode_size: false }
    }
}

impl ReplConfig {
    /// Reads `$XDG_CONFIG_HOME/copper/config.toml`, falling back to
    /// `~/.config/copper/config.toml` via the `dirs` crate. A missing file,
    /// or one that fails to parse, silently yields defaults rather than
    /// blocking REPL startup.
    pub fn load() -> Self {
        let Some(config_dir) = dirs::config_dir() else {
            return ReplConfig::default();
        };
        let path = config_dir.join("copper").join("config.toml");

        match std::fs::read_to_string(&path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config");
                ReplConfig::default()
            }),
            Err(_) => ReplConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_prompt() {
        let config = ReplConfig::default();
        assert_eq!(config.prompt, "> ");
        assert!(!config.trace_bytecode_size);
    }

    #[test]
    fn parses_a_partial_config() {
        let config: ReplConfig = toml::from_str(r#"prompt = "copper> ""#).unwrap();
        assert_eq!(config.prompt, "copper> ");
        assert!(!config.trace_bytecode_size);
    }
}
