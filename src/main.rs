// Entrypoint for the probe runner.
// - Keeps `main` small: parse settings, set up logging, then either run the
//   probe named on the command line or hand over to the interactive menu.

use api_probe::{config::Settings, init_logging, probes::Harness, ui::main_menu};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    init_logging(&settings.log_level);

    let harness = Harness::from_settings(&settings)?;

    match settings.probe {
        Some(probe) => probe.run(&harness)?,
        None => main_menu(&harness)?,
    }
    Ok(())
}
