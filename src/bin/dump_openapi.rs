use std::fs;

use access_gate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    // Same document the server publishes, for the configuration in the environment.
    let config = AppConfig::from_env()?;
    let doc = access_gate::docs::build_openapi(&config)?;
    let s = serde_json::to_string_pretty(&doc)?;

    match std::env::args().nth(1) {
        Some(path) => {
            fs::write(&path, s)?;
            println!("wrote {}", path);
        }
        None => println!("{}", s),
    }
    Ok(())
}
