//! Toxicity categories, per-category probabilities and the verdict rule.
//!
//! The model is multi-label: each category probability comes from its own
//! sigmoid, so several can be high at once and they need not sum to 1.
//! Nothing here normalises scores or picks a single winning category.

use serde::{Deserialize, Serialize};

use crate::error::{DetoxError, Result};

/// Number of categories produced by the classifier head.
pub const CATEGORY_COUNT: usize = 6;

/// Default decision threshold. A score must be strictly above it.
pub const DEFAULT_TOXICITY_THRESHOLD: f32 = 0.5;

/// Fixed, ordered toxicity categories. Order matches the model output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Toxic,
    SevereToxic,
    Obscene,
    Threat,
    Insult,
    IdentityHate,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Toxic,
        Category::SevereToxic,
        Category::Obscene,
        Category::Threat,
        Category::Insult,
        Category::IdentityHate,
    ];

    /// Position of this category in the classifier output vector.
    pub fn index(self) -> usize {
        match self {
            Category::Toxic => 0,
            Category::SevereToxic => 1,
            Category::Obscene => 2,
            Category::Threat => 3,
            Category::Insult => 4,
            Category::IdentityHate => 5,
        }
    }

    /// Stable machine key (matches the serde representation).
    pub fn key(self) -> &'static str {
        match self {
            Category::Toxic => "toxic",
            Category::SevereToxic => "severe_toxic",
            Category::Obscene => "obscene",
            Category::Threat => "threat",
            Category::Insult => "insult",
            Category::IdentityHate => "identity_hate",
        }
    }

    /// Human-facing label shown next to the score bar.
    pub fn label(self) -> &'static str {
        match self {
            Category::Toxic => "💀 Toxic",
            Category::SevereToxic => "☠️ Very Toxic",
            Category::Obscene => "🔞 Obscene",
            Category::Threat => "⚠️ Threat",
            Category::Insult => "👊 Insult",
            Category::IdentityHate => "🧭 Identity Hate",
        }
    }
}

/// Six independent probabilities in [0, 1], in `Category::ALL` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryScores([f32; CATEGORY_COUNT]);

impl CategoryScores {
    /// Validate a raw classifier vector.
    ///
    /// # Errors
    /// `DetoxError::Inference` if the vector does not hold exactly six finite
    /// values in [0, 1].
    pub fn from_slice(raw: &[f32]) -> Result<Self> {
        if raw.len() != CATEGORY_COUNT {
            return Err(DetoxError::Inference(format!(
                "classifier returned {} scores, expected {CATEGORY_COUNT}",
                raw.len()
            )));
        }
        let mut scores = [0.0f32; CATEGORY_COUNT];
        for (slot, &value) in scores.iter_mut().zip(raw) {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DetoxError::Inference(format!(
                    "classifier score {value} outside [0, 1]"
                )));
            }
            *slot = value;
        }
        Ok(Self(scores))
    }

    /// Build scores from raw logits using an element-wise sigmoid.
    pub fn from_logits(logits: &[f32]) -> Result<Self> {
        let probs: Vec<f32> = logits.iter().map(|&l| sigmoid(l)).collect();
        Self::from_slice(&probs)
    }

    pub fn get(&self, category: Category) -> f32 {
        self.0[category.index()]
    }

    pub fn as_array(&self) -> &[f32; CATEGORY_COUNT] {
        &self.0
    }

    /// Highest score and its category. Used for logging only.
    pub fn max(&self) -> (Category, f32) {
        Category::ALL
            .iter()
            .map(|&c| (c, self.get(c)))
            .fold((Category::Toxic, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            })
    }

    /// Every category with its raw score, in fixed order.
    pub fn breakdown(&self) -> Vec<CategoryScore> {
        Category::ALL
            .iter()
            .map(|&category| CategoryScore {
                category,
                label: category.label().to_string(),
                score: self.get(category),
            })
            .collect()
    }
}

/// One row of the breakdown payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: Category,
    pub label: String,
    pub score: f32,
}

/// Binary outcome of the thresholding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Verdict {
    NonToxic,
    Toxic,
}

impl Verdict {
    pub fn is_toxic(self) -> bool {
        self == Verdict::Toxic
    }

    /// Status line shown in the UI.
    pub fn status_text(self) -> &'static str {
        match self {
            Verdict::Toxic => "🚩 Toxic",
            Verdict::NonToxic => "✅ Non-Toxic",
        }
    }

    /// Phrase handed to the narrator.
    pub fn narration_text(self) -> &'static str {
        match self {
            Verdict::Toxic => "Result is Toxic",
            Verdict::NonToxic => "Result is Non-Toxic",
        }
    }
}

/// Toxic iff any category is strictly above `threshold`.
pub fn decide(scores: &CategoryScores, threshold: f32) -> Verdict {
    if scores.as_array().iter().any(|&s| s > threshold) {
        Verdict::Toxic
    } else {
        Verdict::NonToxic
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
