use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = r#"# Quill configuration

[llm]
model = "gpt-4o-mini"
# Falls back to the OPENAI_API_KEY environment variable when empty
api_key = ""
temperature = 0.1
max_tokens = 2048

[embedding]
model = "text-embedding-3-small"
dimensions = 1536

[search]
top_k = 30
candidate_pool = 100
batch_size = 1
batch_delay_ms = 50
"#;

/// Initialize a new config file
pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config already exists at {:?}", path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;
    println!("Created config at {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: quill_engine::EngineConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.search.candidate_pool, 100);
    }

    #[test]
    fn test_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.toml");
        run_init(&path).unwrap();
        assert!(run_init(&path).is_err());
    }
}
