use colored::Colorize;
use log::{error, info};

use sensorial::{init_logger, parse_args, Config, Result, Scene, SceneReport};

fn print_report(report: &SceneReport) -> Result<()> {
    println!(
        "{} {}ms, {} frames, scroll {}px",
        "scene finished:".green().bold(),
        report.elapsed_ms,
        report.frames_run,
        report.scroll_y
    );
    println!(
        "  revealed {} / waiting {}, section {}, menu {}",
        report.revealed,
        report.waiting_reveal,
        report.current_section.as_deref().unwrap_or("-"),
        if report.menu_open { "open" } else { "closed" }
    );
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn run() -> Result<()> {
    let cli_args = parse_args();
    init_logger(&cli_args.log_level);

    let config = match &cli_args.config_path {
        Some(path) => {
            info!("loading config from {}", path.display());
            Config::load(path)?
        }
        None => Config::default(),
    };

    let Some(scene_path) = &cli_args.scene_path else {
        sensorial::show_help();
        return Ok(());
    };
    let scene = Scene::load(scene_path)?;
    info!(
        "running {} ({} elements, {} steps)",
        scene_path.display(),
        scene.elements.len(),
        scene.script.len()
    );

    let report = scene.run(config)?;
    print_report(&report)
}

fn main() {
    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
