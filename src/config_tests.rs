//! Unit tests for configuration loading.

#[cfg(test)]
mod tests {
    use crate::config::{Config, ReadEnv};
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct InMemoryEnv(HashMap<&'static str, &'static str>);

    impl InMemoryEnv {
        fn new(pairs: &[(&'static str, &'static str)]) -> Self {
            Self(pairs.iter().cloned().collect())
        }
    }

    impl ReadEnv for InMemoryEnv {
        fn var(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── from_file ─────────────────────────────────────────────────────────────

    #[test]
    fn test_from_file_minimal() {
        let toml = r#"
[discord]
bot_token = "BOT-TOKEN-123"
"#;
        let f = write_toml(toml);
        let cfg = Config::from_file(f.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.discord.bot_token, "BOT-TOKEN-123");
        assert_eq!(cfg.openai.model, "gpt-4o");
        assert_eq!(cfg.storage.data_dir, "data");
        assert_eq!(cfg.behavior.defaults.cooldown_secs, 10);
        assert_eq!(cfg.behavior.defaults.interjection_rate, 0.0);
        // No API key → echo mode.
        assert!(cfg.openai_config().is_none());
    }

    #[test]
    fn test_from_file_full() {
        let toml = r#"
[discord]
bot_token = "SECRET"

[openai]
api_key = "sk-test"
model = "gpt-4o-mini"
max_tokens = 512

[storage]
data_dir = "/var/lib/persona-bot"

[behavior]
system_prompt = "You are a pirate."

[behavior.defaults]
cooldown_secs = 5
interjection_rate = 0.1
"#;
        let f = write_toml(toml);
        let cfg = Config::from_file(f.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.openai.api_key, "sk-test");
        assert_eq!(cfg.storage.data_dir, "/var/lib/persona-bot");
        assert_eq!(
            cfg.behavior.system_prompt.as_deref(),
            Some("You are a pirate.")
        );
        assert_eq!(cfg.behavior.defaults.cooldown_secs, 5);
        assert_eq!(cfg.behavior.defaults.interjection_rate, 0.1);

        let llm = cfg.openai_config().unwrap();
        assert_eq!(llm.model, "gpt-4o-mini");
        assert_eq!(llm.max_tokens, 512);
    }

    #[test]
    fn test_from_file_missing_returns_error() {
        let result = Config::from_file("/nonexistent/path/config.toml");
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("Failed to read config file"));
    }

    #[test]
    fn test_from_file_invalid_toml_returns_error() {
        let f = write_toml("this is not valid toml !!!");
        let result = Config::from_file(f.path().to_str().unwrap());
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("Failed to parse config file"));
    }

    // ── from_env ──────────────────────────────────────────────────────────────

    #[test]
    fn test_from_env_minimal() {
        let env = InMemoryEnv::new(&[("DISCORD_BOT_TOKEN", "TOK")]);
        let cfg = Config::from_env(&env).unwrap();
        assert_eq!(cfg.discord.bot_token, "TOK");
        assert!(cfg.openai_config().is_none());
        assert_eq!(cfg.storage.data_dir, "data");
    }

    #[test]
    fn test_from_env_missing_token_fails() {
        let env = InMemoryEnv::new(&[]);
        let result = Config::from_env(&env);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("DISCORD_BOT_TOKEN"));
    }

    #[test]
    fn test_from_env_full() {
        let env = InMemoryEnv::new(&[
            ("DISCORD_BOT_TOKEN", "TOK"),
            ("OPENAI_API_KEY", "sk-env"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OPENAI_BASE_URL", "http://localhost:9999/v1"),
            ("OPENAI_MAX_TOKENS", "256"),
            ("BOT_DATA_DIR", "/tmp/state"),
            ("BOT_SYSTEM_PROMPT", "Be terse."),
            ("BOT_COOLDOWN_SECS", "30"),
            ("BOT_INTERJECTION_RATE", "0.25"),
        ]);
        let cfg = Config::from_env(&env).unwrap();
        assert_eq!(cfg.storage.data_dir, "/tmp/state");
        assert_eq!(cfg.behavior.system_prompt.as_deref(), Some("Be terse."));
        assert_eq!(cfg.behavior.defaults.cooldown_secs, 30);
        assert_eq!(cfg.behavior.defaults.interjection_rate, 0.25);

        let llm = cfg.openai_config().unwrap();
        assert_eq!(llm.api_key, "sk-env");
        assert_eq!(llm.base_url, "http://localhost:9999/v1");
        assert_eq!(llm.max_tokens, 256);
    }

    #[test]
    fn test_from_env_unparseable_numbers_fall_back() {
        let env = InMemoryEnv::new(&[
            ("DISCORD_BOT_TOKEN", "TOK"),
            ("OPENAI_MAX_TOKENS", "lots"),
            ("BOT_COOLDOWN_SECS", "soon"),
        ]);
        let cfg = Config::from_env(&env).unwrap();
        assert_eq!(cfg.openai.max_tokens, 2000);
        assert_eq!(cfg.behavior.defaults.cooldown_secs, 10);
    }

    #[test]
    fn test_from_env_interjection_rate_clamped() {
        let env = InMemoryEnv::new(&[
            ("DISCORD_BOT_TOKEN", "TOK"),
            ("BOT_INTERJECTION_RATE", "7.5"),
        ]);
        let cfg = Config::from_env(&env).unwrap();
        assert_eq!(cfg.behavior.defaults.interjection_rate, 1.0);
    }
}
