pub mod animation;
pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod page;
pub mod scene;
pub mod ui;

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod dom_host;
#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
pub mod wasm_entry;

use std::env;
use std::path::PathBuf;


pub use app::{App, Page};
pub use config::Config;
pub use error::{Result, SensoryError};
pub use scene::{Scene, SceneReport};

// ========================================
// コマンドライン引数
// ========================================

#[derive(Debug)]
pub struct CliArgs {
    pub quiet: bool, // panic以外のログを抑制
    pub log_level: LogLevel,
    pub config_path: Option<PathBuf>,
    pub scene_path: Option<PathBuf>,
    pub show_help: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            quiet: false,
            log_level: LogLevel::Info,
            config_path: None,
            scene_path: None,
            show_help: false,
        }
    }
}

/// プロセスの引数を解析する。`--help` なら使い方を表示して終了
pub fn parse_args() -> CliArgs {
    let cli_args = parse_args_from(env::args().skip(1));
    if cli_args.show_help {
        show_help();
        std::process::exit(0);
    }
    cli_args
}

pub fn parse_args_from<I, S>(args: I) -> CliArgs
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut cli_args = CliArgs::default();

    for arg in args {
        let arg = arg.as_ref();
        match arg {
            "--quiet" | "-q" => {
                cli_args.quiet = true;
                cli_args.log_level = LogLevel::Off;
            }
            "--log-level=off" => cli_args.log_level = LogLevel::Off,
            "--log-level=error" => cli_args.log_level = LogLevel::Error,
            "--log-level=warn" => cli_args.log_level = LogLevel::Warn,
            "--log-level=info" => cli_args.log_level = LogLevel::Info,
            "--log-level=debug" => cli_args.log_level = LogLevel::Debug,
            "--log-level=trace" => cli_args.log_level = LogLevel::Trace,
            "--help" | "-h" => cli_args.show_help = true,
            _ => {
                if let Some(path) = arg.strip_prefix("--config=") {
                    cli_args.config_path = Some(PathBuf::from(path));
                } else if let Some(path) = arg.strip_prefix("--scene=") {
                    cli_args.scene_path = Some(PathBuf::from(path));
                } else if !arg.starts_with('-') && cli_args.scene_path.is_none() {
                    cli_args.scene_path = Some(PathBuf::from(arg));
                }
            }
        }
    }
    cli_args
}

/// 使い方の説明文
pub fn help_text() -> &'static str {
    "Sensorial scene runner

USAGE:
    sensorial [OPTIONS] [SCENE]

OPTIONS:
    --scene=PATH             Scene file to replay (same as the positional SCENE)
    --config=PATH            JSON configuration overriding the defaults
    --quiet, -q              Suppress all logs except panics
    --log-level=LEVEL        Set log level (off/error/warn/info/debug/trace)
    --help, -h               Show this help"
}

/// ロガーの初期化前や `--quiet` でも表示されるよう stdout に直接書く
pub fn show_help() {
    println!("{}", help_text());
}

/// プロセス全体で一度だけ `env_logger` を初期化する
pub fn init_logger(log_level: &LogLevel) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::sync::Once;

    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let level = match log_level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        };

        let mut builder = Builder::from_default_env();

        if matches!(log_level, LogLevel::Off) {
            builder
                .filter_level(LevelFilter::Off)
                .format(|_, _| Ok(()))
                .try_init()
                .ok();
        } else {
            builder
                .filter_level(level)
                .format_timestamp_millis()
                .try_init()
                .ok();
        }
    });
}
