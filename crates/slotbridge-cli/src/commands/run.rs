//! `slotbridge run`: execute scenarios and print their transcripts.

use anyhow::{anyhow, Context};
use slotbridge_demo::Transcript;
use slotbridge_engine::Bridge;
use std::path::PathBuf;

use crate::config::CliConfig;
use crate::logger;
use crate::scenarios::{self, Scenario, SCENARIOS};

pub struct RunArgs {
    pub scenario: Option<String>,
    pub config: Option<PathBuf>,
    pub verbose: bool,
}

pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => CliConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CliConfig::default(),
    };
    logger::init(config.log_level(args.verbose))?;

    let selected: Vec<&Scenario> = match &args.scenario {
        Some(name) => vec![scenarios::find(name)
            .ok_or_else(|| anyhow!("unknown scenario '{}' (try `slotbridge list`)", name))?],
        None => SCENARIOS.iter().collect(),
    };

    for scenario in selected {
        let lines = run_one(scenario, &config)
            .with_context(|| format!("scenario '{}' failed", scenario.name))?;
        println!("== {}", scenario.name);
        for line in lines {
            println!("{}", line);
        }
    }
    Ok(())
}

fn run_one(scenario: &Scenario, config: &CliConfig) -> anyhow::Result<Vec<String>> {
    let transcript = Transcript::new();
    let bridge = Bridge::new(config.bridge.clone());
    for class in slotbridge_demo::classes(&transcript) {
        bridge.register_class(class)?;
    }
    log::info!("running scenario {}", scenario.name);
    (scenario.body)(&bridge, &transcript)?;
    bridge.process_pending();
    Ok(transcript.take())
}
