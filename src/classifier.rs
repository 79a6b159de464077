//! Query Classifier (C4): scores a prompt against keyword/regex rules and
//! emits a tier with confidence and an explanation.
//!
//! Deterministic and network-free by design (§4.4) — the router must be able
//! to make the same decision twice against the same prompt, and the CLI must
//! be able to show the user *why* a prompt landed in a tier.

use crate::types::Tier;
use std::collections::HashMap;

/// A single weighted trigger: either a plain keyword (substring match,
/// case-insensitive) or a regex pattern.
struct Trigger {
    pattern: TriggerPattern,
    weight: f32,
}

enum TriggerPattern {
    Keyword(&'static str),
    Regex(regex::Regex),
}

struct TierRules {
    triggers: Vec<Trigger>,
}

/// The outcome of classifying one prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub tier: Tier,
    pub confidence: f32,
    pub matched: Vec<String>,
}

/// Holds the tier scoring rules. Construct once (it's not cheap to rebuild
/// the regex set per call) and reuse across classifications.
pub struct Classifier {
    rules: HashMap<Tier, TierRules>,
}

impl Classifier {
    /// Builds the classifier with its fixed rule set.
    pub fn new() -> Self {
        let mut rules = HashMap::new();

        rules.insert(
            Tier::Fast,
            TierRules {
                triggers: vec![
                    keyword("what is", 2.0),
                    keyword("is ", 1.0),
                    keyword("calculate", 2.0),
                    keyword("define", 1.5),
                    keyword("yes or no", 2.0),
                    regex(r"\b\d+\s*[+\-*/]\s*\d+\b", 2.5),
                    keyword("quick question", 2.0),
                    // Anti-triggers: these phrases signal the asker wants more
                    // than a quick lookup, so they pull a prompt back out of
                    // Fast even if it also matched a positive trigger above.
                    anti_keyword("in detail", 2.0),
                    anti_keyword("step by step", 2.0),
                ],
            },
        );

        rules.insert(
            Tier::Deep,
            TierRules {
                triggers: vec![
                    keyword("explain", 1.5),
                    keyword("why", 1.0),
                    keyword("how does", 1.5),
                    keyword("compare", 1.5),
                    keyword("pros and cons", 2.0),
                    keyword("reason about", 2.0),
                    // "quick"/"briefly" signal Fast, not Deep, even in a
                    // prompt that otherwise reads as an explanation request.
                    anti_keyword("quick", 1.5),
                    anti_keyword("briefly", 1.5),
                ],
            },
        );

        rules.insert(
            Tier::Analysis,
            TierRules {
                triggers: vec![
                    keyword("analyze", 2.0),
                    keyword("summarize", 1.5),
                    keyword("extract", 1.5),
                    keyword("classify", 1.5),
                    keyword("structured", 1.5),
                    keyword("json", 1.0),
                    keyword("table", 1.0),
                    // Creative-writing language is not structured analysis.
                    anti_keyword("poem", 1.5),
                    anti_keyword("story", 1.5),
                ],
            },
        );

        rules.insert(
            Tier::Writing,
            TierRules {
                triggers: vec![
                    keyword("write a", 2.0),
                    keyword("write an", 2.0),
                    keyword("poem", 2.0),
                    keyword("haiku", 2.5),
                    keyword("story", 1.5),
                    keyword("essay", 2.0),
                    keyword("draft", 1.5),
                    keyword("compose", 1.5),
                    // A request for structured/machine-readable output is not
                    // a creative-writing request, even if it says "write".
                    anti_keyword("json", 1.5),
                    anti_keyword("table", 1.5),
                ],
            },
        );

        Self { rules }
    }

    /// Classifies `prompt`. If `forced` is `Some`, classification is skipped
    /// entirely and the forced tier is returned with confidence 1.0 (§4.4).
    pub fn classify(&self, prompt: &str, forced: Option<Tier>) -> Classification {
        if let Some(tier) = forced {
            return Classification {
                tier,
                confidence: 1.0,
                matched: Vec::new(),
            };
        }

        let lower = prompt.to_lowercase();
        let mut scores: HashMap<Tier, f32> = HashMap::new();
        let mut matches: HashMap<Tier, Vec<String>> = HashMap::new();

        // Fixed tiebreak order: 1 (Fast), 2 (Deep), 3 (Analysis), 4 (Writing).
        let ordered_tiers = [Tier::Fast, Tier::Deep, Tier::Analysis, Tier::Writing];

        for tier in ordered_tiers {
            let Some(tier_rules) = self.rules.get(&tier) else { continue };
            let mut score = 0.0f32;
            let mut matched_here = Vec::new();

            for trigger in &tier_rules.triggers {
                let hit = match &trigger.pattern {
                    TriggerPattern::Keyword(k) => lower.contains(k),
                    TriggerPattern::Regex(r) => r.is_match(&lower),
                };
                if hit {
                    score += trigger.weight;
                    matched_here.push(match &trigger.pattern {
                        TriggerPattern::Keyword(k) => k.to_string(),
                        TriggerPattern::Regex(r) => r.as_str().to_string(),
                    });
                }
            }

            scores.insert(tier, score);
            matches.insert(tier, matched_here);
        }

        let total_abs: f32 = scores.values().map(|s| s.abs()).sum();

        // Fixed tiebreak order 1,2,3,4: scan in `ordered_tiers` order and
        // keep only strictly-better scores, so the first tier to reach the
        // max wins ties.
        let mut winner = Tier::Deep;
        let mut best = f32::MIN;
        for tier in ordered_tiers {
            let score = scores[&tier];
            if score > best {
                best = score;
                winner = tier;
            }
        }

        let winning_score = scores.get(&winner).copied().unwrap_or(0.0);

        if winning_score <= 0.0 {
            return Classification {
                tier: Tier::Deep,
                confidence: 0.3,
                matched: Vec::new(),
            };
        }

        let raw_confidence = if total_abs > 0.0 { winning_score / total_abs } else { 0.3 };
        let confidence = raw_confidence.clamp(0.3, 1.0);

        Classification {
            tier: winner,
            confidence,
            matched: matches.remove(&winner).unwrap_or_default(),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

fn keyword(word: &'static str, weight: f32) -> Trigger {
    Trigger { pattern: TriggerPattern::Keyword(word), weight }
}

/// An anti-trigger: a keyword whose presence argues *against* the tier it's
/// attached to. `weight` is given as a positive magnitude and stored negated,
/// so a hit subtracts from the tier's score instead of adding to it.
fn anti_keyword(word: &'static str, weight: f32) -> Trigger {
    Trigger { pattern: TriggerPattern::Keyword(word), weight: -weight.abs() }
}

fn regex(pattern: &str, weight: f32) -> Trigger {
    Trigger {
        pattern: TriggerPattern::Regex(regex::Regex::new(pattern).expect("static classifier regex is valid")),
        weight,
    }
}
