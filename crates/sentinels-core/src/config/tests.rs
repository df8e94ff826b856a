use super::*;
use std::collections::HashMap;

#[test]
fn test_defaults_when_sections_missing() {
    let cfg: Config = toml::from_str("").unwrap();
    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.provider.default, "gemini");
    assert_eq!(cfg.provider.timeout_secs, 45);
    assert_eq!(cfg.store.backend, "sqlite");
    assert_eq!(cfg.telegram.history_max_entries, 20);
    assert_eq!(cfg.scraper.max_chars, 50_000);
    assert_eq!(cfg.scraper.max_page_bytes, 2 * 1024 * 1024);
    assert!(cfg.expiry.enabled);
    assert!(cfg.admin.admin_key.is_empty());
}

#[test]
fn test_parse_full_config() {
    let toml_str = r#"
        [server]
        port = 8080
        public_url = "https://bots.example.com"

        [admin]
        admin_key = "s3cret"

        [provider]
        default = "openai"
        timeout_secs = 20
        [provider.openai]
        api_key = "sk-test"

        [store]
        backend = "supabase"
        supabase_url = "https://abc.supabase.co"
        supabase_key = "service"

        [chain]
        genesis_contract = "0x1111111111111111111111111111111111111111"

        [expiry]
        warn_days = 7
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.server.port, 8080);
    assert_eq!(cfg.server.public_url, "https://bots.example.com");
    assert_eq!(cfg.admin.admin_key, "s3cret");
    assert_eq!(cfg.provider.default, "openai");
    assert_eq!(cfg.provider.timeout_secs, 20);
    let openai = cfg.provider.openai.unwrap();
    assert_eq!(openai.api_key, "sk-test");
    assert_eq!(openai.model, "gpt-4o-mini");
    assert_eq!(openai.base_url, "https://api.openai.com/v1");
    assert_eq!(cfg.store.backend, "supabase");
    assert_eq!(cfg.chain.rpc_url, "https://bsc-dataseed.binance.org");
    assert_eq!(cfg.expiry.warn_days, 7);
    assert_eq!(cfg.expiry.poll_interval_secs, 3600);
}

#[test]
fn test_env_overrides_file_values() {
    let mut cfg = Config::default();
    cfg.admin.admin_key = "from-file".into();

    let env: HashMap<&str, &str> = [
        ("ADMIN_KEY", "from-env"),
        ("GEMINI_API_KEY", "AIza-env"),
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("SENTINELS_PORT", "9090"),
        ("GENESIS_CONTRACT_ADDRESS", "0x2222222222222222222222222222222222222222"),
    ]
    .into_iter()
    .collect();
    cfg.apply_env_from(|k| env.get(k).map(|v| v.to_string()));

    assert_eq!(cfg.admin.admin_key, "from-env");
    assert_eq!(cfg.provider.gemini.unwrap().api_key, "AIza-env");
    assert_eq!(cfg.telegram.community_bot_token, "123:abc");
    assert_eq!(cfg.server.port, 9090);
    assert_eq!(
        cfg.chain.genesis_contract,
        "0x2222222222222222222222222222222222222222"
    );
}

#[test]
fn test_env_empty_values_are_ignored() {
    let mut cfg = Config::default();
    cfg.admin.admin_key = "keep".into();
    cfg.apply_env_from(|k| (k == "ADMIN_KEY").then(|| "   ".to_string()));
    assert_eq!(cfg.admin.admin_key, "keep");
}

#[test]
fn test_env_invalid_port_keeps_default() {
    let mut cfg = Config::default();
    cfg.apply_env_from(|k| (k == "SENTINELS_PORT").then(|| "not-a-port".to_string()));
    assert_eq!(cfg.server.port, 3000);
}

#[test]
fn test_openai_env_creates_section() {
    let mut cfg = Config::default();
    assert!(cfg.provider.openai.is_none());
    cfg.apply_env_from(|k| (k == "OPENAI_API_KEY").then(|| "sk-env".to_string()));
    let openai = cfg.provider.openai.unwrap();
    assert_eq!(openai.api_key, "sk-env");
    assert_eq!(openai.model, "gpt-4o-mini");
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__sentinels_config__.toml").unwrap();
    assert_eq!(cfg.server.host, "0.0.0.0");
}

#[test]
fn test_load_rejects_invalid_toml() {
    let tmp = std::env::temp_dir().join("__sentinels_bad_config__.toml");
    std::fs::write(&tmp, "[server\nport = ").unwrap();
    let err = load(tmp.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, SentinelError::Config(_)));
    let _ = std::fs::remove_file(&tmp);
}

#[test]
fn test_shellexpand_leaves_absolute_paths() {
    assert_eq!(shellexpand("/var/lib/db"), "/var/lib/db");
}
