//! `docpilot doctor` — Diagnose configuration, provider and index health.

use super::{CliResult, open_index, open_store};
use docpilot_config::AppConfig;

pub async fn run() -> CliResult {
    println!("🩺 docpilot Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `docpilot onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ Model API key configured");
    } else {
        println!("  ⚠️  No model API key — set OPENAI_API_KEY or DOCPILOT_API_KEY");
        issues += 1;
    }

    let router = docpilot_providers::build_from_config(&config);
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider '{}' reachable", provider.name()),
            Ok(false) | Err(_) => {
                println!("  ⚠️  Provider '{}' not reachable", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ Default provider '{}' not configured", config.default_provider);
            issues += 1;
        }
    }

    if config.web_search.enabled {
        if config.web_search.api_key.is_some() {
            println!("  ✅ Web search configured ({})", config.web_search.api_url);
        } else {
            println!("  ⚠️  Web search enabled but no TAVILY_API_KEY set");
            issues += 1;
        }
    } else {
        println!("  ➖ Web search disabled");
    }

    if config.knowledge.docs_dir.is_dir() {
        println!("  ✅ Docs folder: {}", config.knowledge.docs_dir.display());
    } else {
        println!("  ⚠️  Docs folder missing: {}", config.knowledge.docs_dir.display());
        issues += 1;
    }

    match open_index(&config).await {
        Ok(index) => {
            let documents = index.documents().await.len();
            println!(
                "  ✅ Index: {documents} document(s), {} chunk(s)",
                index.chunk_count().await
            );
            if documents == 0 {
                println!("  ⚠️  Index is empty — run `docpilot ingest`");
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    match open_store(&config).await {
        Ok(store) => println!("  ✅ Checkpoint store: {}", store.name()),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
