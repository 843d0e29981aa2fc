//! ページ設定
//!
//! 各コンポーネントのコンストラクタに渡す明示的な構造体。すべてのフィールドに
//! 既定値があるので、JSON ファイルには変更する値だけを書けばよい。

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SensoryError};
use crate::ui::observer::ObserverOptions;
use crate::ui::viewport::RootMargin;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub breakpoints: Breakpoints,
    pub animation: AnimationConfig,
    pub scroll: ScrollConfig,
    pub reveal: RevealConfig,
    pub counter: CounterConfig,
    pub loading: LoadingConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breakpoints {
    pub mobile: f32,
    pub tablet: f32,
    pub desktop: f32,
}

impl Default for Breakpoints {
    fn default() -> Self {
        Self {
            mobile: 768.0,
            tablet: 1024.0,
            desktop: 1280.0,
        }
    }
}

/// 表示エフェクトとスクロールの動き
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub fade_ms: u64,
    pub slide_ms: u64,
    pub slide_offset_px: f32,
    pub smooth_scroll_ms: u64,
    /// アンカーへスクロールするときに空けておく固定ヘッダーの高さ
    pub header_offset_px: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fade_ms: 800,
            slide_ms: 600,
            slide_offset_px: 50.0,
            smooth_scroll_ms: 800,
            header_offset_px: 70.0,
        }
    }
}

impl AnimationConfig {
    pub fn smooth_scroll(&self) -> Duration {
        Duration::from_millis(self.smooth_scroll_ms)
    }
}

/// スクロールに連動する見た目の状態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollConfig {
    /// アクティブなセクションを選ぶときにスクロール位置へ足す値
    pub section_offset_px: f32,
    pub nav_scrolled_px: f32,
    pub back_to_top_px: f32,
    pub scroll_throttle_ms: u64,
    pub back_to_top_throttle_ms: u64,
    pub resize_debounce_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            section_offset_px: 100.0,
            nav_scrolled_px: 50.0,
            back_to_top_px: 300.0,
            scroll_throttle_ms: 16,
            back_to_top_throttle_ms: 100,
            resize_debounce_ms: 250,
        }
    }
}

impl ScrollConfig {
    pub fn scroll_throttle(&self) -> Duration {
        Duration::from_millis(self.scroll_throttle_ms)
    }

    pub fn back_to_top_throttle(&self) -> Duration {
        Duration::from_millis(self.back_to_top_throttle_ms)
    }

    pub fn resize_debounce(&self) -> Duration {
        Duration::from_millis(self.resize_debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    pub threshold: f32,
    pub root_margin: String,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: "0px 0px -50px 0px".to_string(),
        }
    }
}

impl RevealConfig {
    pub fn observer_options(&self) -> Result<ObserverOptions> {
        Ok(ObserverOptions {
            threshold: self.threshold,
            root_margin: self.root_margin.parse::<RootMargin>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    pub duration_ms: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self { duration_ms: 2000 }
    }
}

impl CounterConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingConfig {
    pub min_display_ms: u64,
    pub fade_out_ms: u64,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            min_display_ms: 1500,
            fade_out_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub feedback_ms: u64,
    pub started_label: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            feedback_ms: 2000,
            started_label: "Download Iniciado!".to_string(),
        }
    }
}

impl Config {
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&source)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.reveal.threshold) {
            return Err(SensoryError::Config(format!(
                "reveal.threshold must be within 0..=1, got {}",
                self.reveal.threshold
            )));
        }
        self.reveal.observer_options()?;
        if self.counter.duration_ms == 0 {
            return Err(SensoryError::Config(
                "counter.duration_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_page_constants() {
        let config = Config::default();
        assert_eq!(config.breakpoints.mobile, 768.0);
        assert_eq!(config.counter.duration(), Duration::from_millis(2000));
        assert_eq!(config.reveal.threshold, 0.1);
        assert_eq!(config.scroll.resize_debounce(), Duration::from_millis(250));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            Config::from_json_str(r#"{ "counter": { "duration_ms": 500 }, "reveal": { "threshold": 0.5 } }"#)
                .unwrap();
        assert_eq!(config.counter.duration_ms, 500);
        assert_eq!(config.reveal.threshold, 0.5);
        assert_eq!(config.reveal.root_margin, "0px 0px -50px 0px");
        assert_eq!(config.loading.min_display_ms, 1500);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Config::from_json_str(r#"{ "reveal": { "threshold": 2.0 } }"#),
            Err(SensoryError::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str(r#"{ "reveal": { "root_margin": "lots" } }"#),
            Err(SensoryError::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str("{ not json"),
            Err(SensoryError::Json(_))
        ));
    }
}
