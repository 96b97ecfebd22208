//! Scoring/weighting constants (spec §4.8), grounded on
//! `src/constants/settings.py`'s `TEXT_LIMITS`/`QUALITY_CONTROLS` tables.

pub const BULLET_COUNT_MIN: usize = 3;
pub const BULLET_COUNT_MAX: usize = 4;

pub const BULLET_MIN_LEN: usize = 20;
pub const BULLET_MAX_LEN: usize = 150;
pub const PRODUCTION_BULLET_MIN_LEN: usize = 50;

pub const CITATION_MIN_LEN: usize = 60;
pub const CITATION_MAX_LEN: usize = 120;

pub const TITLE_MIN_LEN: usize = 1;
pub const TITLE_MAX_LEN: usize = 120;
pub const PRODUCTION_TITLE_MIN_LEN: usize = 20;

pub const LEAD_PARAGRAPH_MAX_LEN: usize = 200;

pub const TOC_TRUNCATE_LEN: usize = 80;

pub const FORBIDDEN_TOKENS: &[&str] = &["this", "that", "these", "those"];

pub const TERMINAL_FORMS: &[&str] = &[".", "!", "?", "\u{3002}"];

pub const POLITE_ENDINGS: &[&str] = &["s.", "ed.", "please."];

pub const META_PREAMBLES: &[&str] = &[
    "understood",
    "here is",
    "here's",
    "as you asked",
    "translation:",
    "summary:",
    "sure,",
    "certainly,",
];

pub const AI_DOMAIN_TOKENS: &[&str] = &[
    "AI", "ML", "LLM", "GPT", "model", "neural", "algorithm", "dataset", "inference", "training",
];

/// Particles/postpositions that make a title grammatically incomplete when
/// trailing (spec §4.7 step 2a). Carried from the reference implementation's
/// closed class; applied as a suffix denylist regardless of output language.
pub const DANGLING_PARTICLES: &[&str] = &["\u{304c}", "\u{3092}", "\u{306b}", "\u{306f}", "\u{3067}", "\u{3068}"];

/// Quality floor ladder for S7's dynamic threshold (spec §4.7 step 1 /
/// §9 Open Question: iterated ×0.9 up to 3 times, then a final ×0.7
/// emergency step).
pub const QUALITY_THRESHOLD_DECAY: f64 = 0.9;
pub const QUALITY_THRESHOLD_ITERATIONS: u32 = 3;
pub const QUALITY_THRESHOLD_FLOOR: f64 = 0.15;
pub const QUALITY_THRESHOLD_EMERGENCY_FACTOR: f64 = 0.7;
pub const QUALITY_THRESHOLD_EMERGENCY_FLOOR: f64 = 0.1;

/// Title quality scoring weights (spec §4.7 step 2c).
pub const TITLE_SCORE_COMPANY_MENTION: i32 = 3;
pub const TITLE_SCORE_NUMERIC_METRIC: i32 = 2;
pub const TITLE_SCORE_ACTION_VERB: i32 = 1;
pub const TITLE_SCORE_MINIMUM: i32 = 3;
