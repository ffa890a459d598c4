//! `slotbridge list`: show the built-in scenarios.

use crate::scenarios::SCENARIOS;

pub fn execute() -> anyhow::Result<()> {
    for scenario in SCENARIOS {
        println!("{:<10} {}", scenario.name, scenario.about);
    }
    Ok(())
}
