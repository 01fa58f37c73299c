//! `parley agents` — list configured agents.

use std::path::Path;

use super::{CommandResult, load_config};

pub fn run(config_path: &Path) -> CommandResult {
    let config = load_config(config_path)?;
    let agents = config.agents();

    if agents.is_empty() {
        println!("No agents configured. Run `parley init` to create a sample agent.");
        return Ok(());
    }

    for agent in agents {
        println!("{} ({})", agent.id, agent.name);
        println!("  Model:   {} (temperature {})", agent.llm.model, agent.llm.temperature);
        match agent.active_prompt() {
            Some(prompt) => println!("  Prompt:  {} chars", prompt.content.chars().count()),
            None => println!("  Prompt:  none active"),
        }
        if agent.tools.is_empty() {
            println!("  Tools:   none");
        }
        for tool in &agent.tools {
            let state = if tool.active { "" } else { " (inactive)" };
            println!("  Tool:    {} [{}]{}", tool.name, tool.kind, state);
        }
        println!();
    }
    Ok(())
}
