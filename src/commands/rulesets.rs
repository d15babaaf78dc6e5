use anyhow::Result;

use crate::config::Config;
use crate::render;

pub fn run(json: bool) -> Result<()> {
    let registry = Config::load()?.registry()?;
    let directory = registry.directory();

    if json {
        println!("{}", serde_json::to_string_pretty(&directory)?);
    } else {
        render::rulesets(&directory);
    }
    Ok(())
}
