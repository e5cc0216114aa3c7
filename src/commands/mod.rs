use std::fmt::Display;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::config::{ConfigManager, LocalConfigManager};

mod info;
mod simulate;

#[derive(Subcommand, Debug)]
pub enum MultilogCmd {
    Simulate(simulate::Cmd),

    Info(info::Cmd),
}

impl Display for MultilogCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultilogCmd::Simulate(cmd) => write!(f, "simulate {}", cmd),
            MultilogCmd::Info(_cmd) => write!(f, "info"),
        }
    }
}

#[derive(Parser)]
#[command(version, long_version = "")]
#[command(about = "Drive the multi-sink logger: file rollover, console and per-thread capture.", long_about = None, disable_help_subcommand = true)]
pub struct Multilog {
    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Write the logger's own diagnostics to stderr. Repeat for more detail.",
        display_order = 999
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: MultilogCmd,
}

impl Multilog {
    fn diagnostics_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::ERROR,
            2 => LevelFilter::WARN,
            3 => LevelFilter::INFO,
            4 => LevelFilter::DEBUG,
            5_u8..=u8::MAX => LevelFilter::TRACE,
        }
    }

    fn setup_diagnostics(&self) -> eyre::Result<()> {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(self.diagnostics_filter())
            .try_init()
            .map_err(|err| eyre::eyre!("Failed installing diagnostics subscriber: {}", err))
    }

    pub fn run(self) -> eyre::Result<()> {
        let config = LocalConfigManager::new();
        self.setup_diagnostics()?;

        tracing::info!("running command {}", &self.cmd);
        let result = self.invoke_sub_command(config);

        if let Err(err) = &result {
            tracing::error!("failed running command {}, error={} cause={}", &self.cmd, err, err.root_cause());
        }

        result
    }

    fn invoke_sub_command<T>(&self, config: T) -> eyre::Result<()>
    where
        T: ConfigManager,
    {
        match &self.cmd {
            MultilogCmd::Simulate(simulate) => simulate.run(&config),
            MultilogCmd::Info(info) => info.run(&config),
        }
    }
}
