//! `docpilot onboard` — First-time setup.

use super::CliResult;
use docpilot_config::AppConfig;

pub async fn run() -> CliResult {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let defaults = AppConfig::default();

    println!("🛠️  docpilot — First-Time Setup");
    println!("===============================\n");

    for (label, dir) in [
        ("config", &config_dir),
        ("docs", &defaults.knowledge.docs_dir),
        ("index", &defaults.knowledge.persist_dir),
    ] {
        if dir.exists() {
            println!("  {label} directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created {label} directory: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. export OPENAI_API_KEY=... (and TAVILY_API_KEY for web search)");
        println!("   2. Copy .txt/.md product documents into {}", defaults.knowledge.docs_dir.display());
        println!("   3. Run: docpilot ingest");
        println!("   4. Run: docpilot ask\n");
    }

    println!("🎉 Setup complete!\n");
    Ok(())
}
