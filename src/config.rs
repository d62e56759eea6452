use serde::{Deserialize, Serialize};

use crate::types::{DifficultyBucket, ProgressionMode};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryParams {
    pub min_attempts: usize,
    pub min_success_rate: f64,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            min_attempts: 5,
            min_success_rate: 0.85,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingParams {
    pub hard_cap_sec: f64,
    pub interruption_hidden_sec: f64,
    pub interruption_blur_min_sec: f64,
    pub outlier_factor: f64,
    pub outlier_floor_sec: f64,
    pub min_baseline_samples: usize,
    pub skill_tag_baseline_min: usize,
    pub fast_ratio: f64,
    pub fast_fallback_sec: f64,
    pub skill_state_fast_sec: f64,
}

impl Default for TimingParams {
    fn default() -> Self {
        Self {
            hard_cap_sec: 180.0,
            interruption_hidden_sec: 20.0,
            interruption_blur_min_sec: 90.0,
            outlier_factor: 2.8,
            outlier_floor_sec: 45.0,
            min_baseline_samples: 6,
            skill_tag_baseline_min: 4,
            fast_ratio: 0.75,
            fast_fallback_sec: 12.0,
            skill_state_fast_sec: 18.0,
        }
    }
}

/// Delta magnitudes for the challenge mode; steady mode scales them by its `delta_scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityParams {
    pub success_window: usize,
    pub strong_streak_delta: f64,
    pub streak_delta: f64,
    pub trend_correct_delta: f64,
    pub low_level_delta: f64,
    pub comeback_gap: f64,
    pub comeback_min_success: f64,
    pub comeback_bonus: f64,
    pub speed_bonus: f64,
    pub inattention_penalty: f64,
    pub severe_wrong_delta: f64,
    pub double_wrong_delta: f64,
    pub trend_wrong_delta: f64,
    pub global_share: f64,
    pub item_correct_reasonable: f64,
    pub item_correct_unreasonable: f64,
    pub item_wrong_reasonable: f64,
    pub item_wrong_unreasonable: f64,
    pub item_inattention: f64,
    pub item_fast_bonus: f64,
}

impl Default for AbilityParams {
    fn default() -> Self {
        Self {
            success_window: 5,
            strong_streak_delta: 0.35,
            streak_delta: 0.2,
            trend_correct_delta: 0.1,
            low_level_delta: 0.05,
            comeback_gap: 0.3,
            comeback_min_success: 0.8,
            comeback_bonus: 0.15,
            speed_bonus: 0.05,
            inattention_penalty: 0.05,
            severe_wrong_delta: 0.5,
            double_wrong_delta: 0.25,
            trend_wrong_delta: 0.15,
            global_share: 0.5,
            item_correct_reasonable: 0.25,
            item_correct_unreasonable: 0.12,
            item_wrong_reasonable: -0.10,
            item_wrong_unreasonable: -0.25,
            item_inattention: -0.03,
            item_fast_bonus: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketWeights {
    pub very_easy: f64,
    pub easy: f64,
    pub core: f64,
    pub hard: f64,
    pub challenge: f64,
}

impl BucketWeights {
    pub fn weight(&self, bucket: DifficultyBucket) -> f64 {
        match bucket {
            DifficultyBucket::VeryEasy => self.very_easy,
            DifficultyBucket::Easy => self.easy,
            DifficultyBucket::Core => self.core,
            DifficultyBucket::Hard => self.hard,
            DifficultyBucket::Challenge => self.challenge,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeParams {
    pub push_threshold: f64,
    pub push_min_samples: usize,
    pub relief_threshold: f64,
    pub relief_min_samples: usize,
    pub bootstrap_probability: f64,
    pub delta_scale: f64,
    pub addition_base_weight: f64,
    pub buckets: BucketWeights,
}

impl ModeParams {
    pub fn challenge() -> Self {
        Self {
            push_threshold: 0.92,
            push_min_samples: 6,
            relief_threshold: 0.55,
            relief_min_samples: 6,
            bootstrap_probability: 0.30,
            delta_scale: 1.0,
            addition_base_weight: 0.6,
            buckets: BucketWeights {
                very_easy: 0.05,
                easy: 0.25,
                core: 0.5,
                hard: 0.15,
                challenge: 0.05,
            },
        }
    }

    pub fn steady() -> Self {
        Self {
            push_threshold: 0.96,
            push_min_samples: 10,
            relief_threshold: 0.52,
            relief_min_samples: 8,
            bootstrap_probability: 0.15,
            delta_scale: 0.6,
            addition_base_weight: 0.72,
            buckets: BucketWeights {
                very_easy: 0.1,
                easy: 0.35,
                core: 0.45,
                hard: 0.08,
                challenge: 0.02,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionParams {
    pub recovery_error_streak: usize,
    pub bootstrap_min_success: f64,
    pub bootstrap_min_attempts: usize,
    pub bucket_success_window: usize,
    pub struggle_success: f64,
    pub thriving_success: f64,
    pub min_bucket_weight: f64,
    pub unlock_ramp: Vec<(usize, i32)>,
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self {
            recovery_error_streak: 3,
            bootstrap_min_success: 0.6,
            bootstrap_min_attempts: 8,
            bucket_success_window: 10,
            struggle_success: 0.7,
            thriving_success: 0.86,
            min_bucket_weight: 0.05,
            // cumulative attempt count on the skill -> highest level allowed
            unlock_ramp: vec![(3, 1), (6, 2), (12, 3)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupParams {
    pub min_days_away: f64,
    pub min_length: u32,
    pub max_length: u32,
    pub long_break_days: f64,
    pub extra_drop_probability: f64,
}

impl Default for WarmupParams {
    fn default() -> Self {
        Self {
            min_days_away: 1.0,
            min_length: 2,
            max_length: 4,
            long_break_days: 3.0,
            extra_drop_probability: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceParams {
    pub window: usize,
    pub min_samples: usize,
    pub min_success_rate: f64,
    pub min_reasonable_rate: f64,
    pub cooldown_ms: i64,
}

impl Default for AdvanceParams {
    fn default() -> Self {
        Self {
            window: 20,
            min_samples: 6,
            min_success_rate: 0.85,
            min_reasonable_rate: 0.70,
            cooldown_ms: 20 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsParams {
    pub recent_selections: usize,
    pub rotation_signatures: usize,
    pub recent_history: usize,
    pub attempt_log: usize,
    pub recent_curated_exclude: usize,
}

impl Default for LimitsParams {
    fn default() -> Self {
        Self {
            recent_selections: 200,
            rotation_signatures: 24,
            recent_history: 250,
            attempt_log: 5000,
            recent_curated_exclude: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub mastery: MasteryParams,
    pub timing: TimingParams,
    pub ability: AbilityParams,
    pub challenge: ModeParams,
    pub steady: ModeParams,
    pub selection: SelectionParams,
    pub warmup: WarmupParams,
    pub advance: AdvanceParams,
    pub limits: LimitsParams,
    pub default_progression_mode: ProgressionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mastery: MasteryParams::default(),
            timing: TimingParams::default(),
            ability: AbilityParams::default(),
            challenge: ModeParams::challenge(),
            steady: ModeParams::steady(),
            selection: SelectionParams::default(),
            warmup: WarmupParams::default(),
            advance: AdvanceParams::default(),
            limits: LimitsParams::default(),
            default_progression_mode: ProgressionMode::Challenge,
        }
    }
}

impl EngineConfig {
    pub fn mode(&self, mode: ProgressionMode) -> &ModeParams {
        match mode {
            ProgressionMode::Challenge => &self.challenge,
            ProgressionMode::Steady => &self.steady,
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_parse::<usize>("ENGINE_MASTERY_MIN_ATTEMPTS") {
            config.mastery.min_attempts = val.max(1);
        }
        if let Some(val) = env_parse::<f64>("ENGINE_MASTERY_MIN_SUCCESS") {
            config.mastery.min_success_rate = val.clamp(0.0, 1.0);
        }
        if let Some(val) = env_parse::<f64>("ENGINE_TIME_HARD_CAP_SEC") {
            if val > 0.0 {
                config.timing.hard_cap_sec = val;
            }
        }
        if let Some(val) = env_parse::<usize>("ENGINE_ROTATION_MAX_SIGNATURES") {
            config.limits.rotation_signatures = val.max(1);
        }
        if let Some(val) = env_parse::<i64>("ENGINE_ADVANCE_COOLDOWN_MIN") {
            config.advance.cooldown_ms = val.max(0) * 60 * 1000;
        }
        if let Ok(val) = std::env::var("ENGINE_DEFAULT_MODE") {
            config.default_progression_mode =
                ProgressionMode::parse_or(&val, config.default_progression_mode);
        }

        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
