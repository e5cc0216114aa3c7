use clap::{Args, CommandFactory};

use crate::{commands::Multilog, config::ConfigManager};

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cmd {}

impl Cmd {
    pub fn run(&self, config: &impl ConfigManager) -> eyre::Result<()> {
        println!(
            "Version:        {}",
            Multilog::command().get_version().unwrap_or("")
        );
        println!(
            "Logs:           {}",
            config
                .get_log_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default()
        );
        println!("Rollover:       never | daily | hourly | lines");
        Ok(())
    }
}
