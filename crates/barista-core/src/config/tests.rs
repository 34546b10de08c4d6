//! Tests for configuration parsing, defaults and validation

#[cfg(test)]
mod tests {
    use super::super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = ConfigLoader::from_str("").unwrap();
        assert_eq!(config.agent.max_tool_rounds, 3);
        assert_eq!(config.llm.provider, LlmProvider::Groq);
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.parameters.temperature, 0.0);
        assert_eq!(config.rag.chunk_size, 500);
        assert_eq!(config.rag.chunk_overlap, 50);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.embeddings.provider, EmbeddingProvider::Hashed);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
        assert!(config.server.cors_origins.contains(&"null".to_string()));
    }

    #[test]
    fn test_parse_full_document() {
        let yaml = r#"
agent:
  max_tool_rounds: 2
  system_prompt: "Be brief."
llm:
  provider:
    custom:
      base_url: "http://localhost:11434/v1"
  model: "llama3"
  parameters:
    temperature: 0.2
    max_tokens: 256
  auth:
    api_key: "local-key"
rag:
  index_path: "/tmp/index.json"
  top_k: 5
  embeddings:
    provider: huggingface
    model: "sentence-transformers/all-MiniLM-L6-v2"
outlets:
  database_path: "/tmp/outlets.db"
server:
  bind_addr: "0.0.0.0:9000"
  cors_origins: ["https://example.com"]
"#;
        let config = ConfigLoader::from_str(yaml).unwrap();
        assert_eq!(config.agent.max_tool_rounds, 2);
        assert_eq!(config.agent.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(
            config.llm.provider,
            LlmProvider::Custom {
                base_url: "http://localhost:11434/v1".to_string()
            }
        );
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("local-key"));
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.rag.embeddings.provider, EmbeddingProvider::HuggingFace);
        assert_eq!(config.server.cors_origins, vec!["https://example.com"]);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "agent:\n  max_tool_rounds: 0\n",
            "rag:\n  chunk_size: 100\n  chunk_overlap: 100\n",
            "rag:\n  top_k: 0\n",
            "server:\n  bind_addr: \"not-an-address\"\n",
            "scraper:\n  products_url: \"ftp://example.com\"\n",
            "llm:\n  provider:\n    custom:\n      base_url: \"\"\n",
        ];
        for yaml in cases {
            let result = ConfigLoader::from_str(yaml);
            assert!(
                matches!(result, Err(AgentError::ConfigError(_))),
                "expected a config error for {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_provider_forms() {
        let config = ConfigLoader::from_str("llm:\n  provider: openai\n").unwrap();
        assert_eq!(config.llm.provider, LlmProvider::OpenAI);
        let config = ConfigLoader::from_str("llm:\n  provider: Groq\n").unwrap();
        assert_eq!(config.llm.provider, LlmProvider::Groq);

        let inline = "llm:\n  provider: {custom: {base_url: \"http://gateway:8080/v1\"}}\n";
        let config = ConfigLoader::from_str(inline).unwrap();
        assert_eq!(
            config.llm.provider,
            LlmProvider::Custom {
                base_url: "http://gateway:8080/v1".to_string()
            }
        );

        for yaml in [
            "llm:\n  provider: anthropic\n",
            "llm:\n  provider: custom\n",
        ] {
            assert!(
                matches!(ConfigLoader::from_str(yaml), Err(AgentError::ConfigError(_))),
                "accepted {:?}",
                yaml
            );
        }
    }

    #[test]
    fn test_provider_serializes_in_the_form_it_is_read() {
        let mut config = BaristaConfig::default();
        config.llm.provider = LlmProvider::Custom {
            base_url: "http://localhost:11434/v1".to_string(),
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("custom:"));
        let reparsed = ConfigLoader::from_str(&yaml).unwrap();
        assert_eq!(reparsed.llm.provider, config.llm.provider);
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ConfigLoader::from_str("agent: [unclosed");
        assert!(matches!(result, Err(AgentError::ConfigError(_))));
    }

    #[test]
    #[serial]
    fn test_api_key_resolved_from_environment() {
        std::env::set_var("BARISTA_TEST_LLM_KEY", "from-env");
        let yaml = "llm:\n  auth:\n    api_key_env: BARISTA_TEST_LLM_KEY\n";
        let config = ConfigLoader::from_str(yaml).unwrap();
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("from-env"));
        std::env::remove_var("BARISTA_TEST_LLM_KEY");
    }

    #[test]
    #[serial]
    fn test_explicit_api_key_wins() {
        std::env::set_var("BARISTA_TEST_LLM_KEY", "from-env");
        let yaml = "llm:\n  auth:\n    api_key: inline\n    api_key_env: BARISTA_TEST_LLM_KEY\n";
        let config = ConfigLoader::from_str(yaml).unwrap();
        assert_eq!(config.llm.auth.api_key.as_deref(), Some("inline"));
        std::env::remove_var("BARISTA_TEST_LLM_KEY");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "outlets:\n  max_rows: 10").unwrap();
        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.outlets.max_rows, 10);
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(config.agent.max_tool_rounds, 3);
    }
}
