use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub app: AppConfig,
}

/// 欠損ランドマークの扱い
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingLandmarkPolicy {
    /// 平均・フラグ判定から除外
    #[default]
    Exclude,
    /// `missing_penalty` の距離として扱う
    Penalize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// この平均距離未満かつフラグなしで "Perfect"
    #[serde(default = "default_perfect_distance_threshold")]
    pub perfect_distance_threshold: f32,
    /// いずれかの関節がこの距離を超えたら肢をフラグ
    #[serde(default = "default_limb_off_distance_threshold")]
    pub limb_off_distance_threshold: f32,
    /// これ未満の一致率は全身がフレーム外とみなす
    #[serde(default = "default_low_confidence_match_percent")]
    pub low_confidence_match_percent: f32,
    /// これ未満の一致率は "Needs improvement"
    #[serde(default = "default_needs_improvement_match_percent")]
    pub needs_improvement_match_percent: f32,
    #[serde(default)]
    pub missing_landmark: MissingLandmarkPolicy,
    /// Penalize 時に欠損ランドマークへ割り当てる距離
    #[serde(default = "default_missing_penalty")]
    pub missing_penalty: f32,
}

fn default_perfect_distance_threshold() -> f32 { 0.35 }
fn default_limb_off_distance_threshold() -> f32 { 0.5 }
fn default_low_confidence_match_percent() -> f32 { 20.0 }
fn default_needs_improvement_match_percent() -> f32 { 50.0 }
fn default_missing_penalty() -> f32 { 1.0 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            perfect_distance_threshold: default_perfect_distance_threshold(),
            limb_off_distance_threshold: default_limb_off_distance_threshold(),
            low_confidence_match_percent: default_low_confidence_match_percent(),
            needs_improvement_match_percent: default_needs_improvement_match_percent(),
            missing_landmark: MissingLandmarkPolicy::default(),
            missing_penalty: default_missing_penalty(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlaybackConfig {
    /// 通常再生のリファレンスフレームレート
    #[serde(default = "default_normal_fps")]
    pub normal_fps: f64,
    /// スロー再生のリファレンスフレームレート
    #[serde(default = "default_slow_fps")]
    pub slow_fps: f64,
}

fn default_normal_fps() -> f64 { 30.0 }
fn default_slow_fps() -> f64 { 15.0 }

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            normal_fps: default_normal_fps(),
            slow_fps: default_slow_fps(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// リファレンス (お手本) キーポイント JSON
    #[serde(default = "default_reference_path")]
    pub reference_path: String,
    /// ライブ入力として再生する録画キーポイント JSON
    #[serde(default = "default_live_path")]
    pub live_path: String,
    /// ライブ入力のキャプチャFPS
    #[serde(default = "default_capture_fps")]
    pub capture_fps: f64,
    /// ライブ入力をX方向に反転する
    #[serde(default)]
    pub mirror_x: bool,
    /// 録画の末尾で先頭に戻る
    #[serde(default)]
    pub loop_live: bool,
    /// セッションレポートの保存先
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
}

fn default_reference_path() -> String { "keypoints/hot_to_go-keypoints.json".to_string() }
fn default_live_path() -> String { "keypoints/live-keypoints.json".to_string() }
fn default_capture_fps() -> f64 { 30.0 }
fn default_report_dir() -> String { "reports".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            reference_path: default_reference_path(),
            live_path: default_live_path(),
            capture_fps: default_capture_fps(),
            mirror_x: false,
            loop_live: false,
            report_dir: default_report_dir(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// ファイルが無いときだけデフォルト。壊れた設定はエラー
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => {
                Self::from_toml_str(&content).with_context(|| format!("invalid config {}", path.display()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("{} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.playback;
        if !(p.normal_fps > 0.0) || !(p.slow_fps > 0.0) {
            bail!("playback fps must be positive (normal={}, slow={})", p.normal_fps, p.slow_fps);
        }
        if !(self.app.capture_fps > 0.0) {
            bail!("capture_fps must be positive ({})", self.app.capture_fps);
        }
        let s = &self.scoring;
        if s.low_confidence_match_percent > s.needs_improvement_match_percent {
            bail!(
                "low_confidence_match_percent ({}) exceeds needs_improvement_match_percent ({})",
                s.low_confidence_match_percent,
                s.needs_improvement_match_percent
            );
        }
        if !(s.perfect_distance_threshold >= 0.0) || !(s.limb_off_distance_threshold >= 0.0) {
            bail!("distance thresholds must be non-negative");
        }
        if !(s.missing_penalty >= 0.0) {
            bail!("missing_penalty must be non-negative ({})", s.missing_penalty);
        }
        Ok(())
    }
}
