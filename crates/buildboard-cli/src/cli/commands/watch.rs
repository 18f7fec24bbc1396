//! Live dashboard command.

use anyhow::Result;
use buildboard_core::config::Config;

#[cfg(feature = "tui")]
pub fn run(config: &Config) -> Result<()> {
    use buildboard_core::config::paths;
    use buildboard_core::logging;

    let _log_guard = match logging::init_file(&paths::logs_dir(), config.log_level.as_deref()) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };
    buildboard_tui::run_dashboard(config)
}

#[cfg(not(feature = "tui"))]
pub fn run(_config: &Config) -> Result<()> {
    anyhow::bail!("buildboard was built without the `tui` feature; use `buildboard snapshot`")
}
