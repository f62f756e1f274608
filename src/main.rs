use std::{env, fs::File};

use anyhow::{Context, Result};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pambu::config::GameConfig;
use pambu::game::{EndReason, SnakeGame};
use pambu::term::{Surface, TermManager};

const LOG_FILE: &str = "pambu.log";

fn main() -> Result<()> {
    // The game owns the screen, so logs go to a file
    let log_path = env::temp_dir().join(LOG_FILE);
    let log_file = File::create(&log_path)
        .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
    WriteLogger::init(LevelFilter::Info, Config::default(), log_file)
        .context("Failed to initialize logger")?;

    info!("Starting pambu");

    let result = play();

    // The terminal is back to normal here, whatever happened
    match result {
        Ok((reason, score)) => {
            println!("{} Score: {}", reason, score);
            Ok(())
        }
        Err(e) => {
            error!("{:#}", e);
            Err(e)
        }
    }
}

fn play() -> Result<(EndReason, u32)> {
    let mut term = TermManager::acquire().context("Failed to set up the terminal")?;
    let (height, width) = term.grid_dimensions();

    let mut game = SnakeGame::new(height, width, GameConfig::default())?;
    let reason = game.run(&mut term)?;

    term.restore().context("Failed to restore the terminal")?;
    Ok((reason, game.score()))
}
