//! Mock visibility scoring.
//!
//! Scores are derived from a base value seeded by the length of the
//! business name and website, jittered with random noise. The pure
//! `compute_*` functions take an explicit RNG; [`ScoreGenerator`] wraps
//! them with the simulated scan latency.

use std::{ops::Range, time::Duration};

use rand::Rng;

use crate::config::ScanDelays;
use crate::models::{CompetitorBenchmark, Impact, Recommendation, ScoreComponents};

const SEO_WEIGHT: f64 = 0.3;
const VISIBILITY_WEIGHT: f64 = 0.3;
const LOCAL_PRESENCE_WEIGHT: f64 = 0.2;
const REPUTATION_WEIGHT: f64 = 0.2;

/// Sub-scores below this produce a recommendation.
const RECOMMENDATION_THRESHOLD: f64 = 70.0;
const MAX_RECOMMENDATIONS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct FastScore {
    pub scores: ScoreComponents,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullScore {
    pub scores: ScoreComponents,
    pub recommendations: Vec<Recommendation>,
    pub competitor_benchmarks: Vec<CompetitorBenchmark>,
}

#[derive(Debug, Clone)]
pub struct ScoreGenerator {
    delays: ScanDelays,
}

impl ScoreGenerator {
    pub fn new(delays: ScanDelays) -> Self {
        Self { delays }
    }

    pub async fn fast_score(&self, website: &str, business_name: &str) -> FastScore {
        let delay = sample_delay(&mut rand::thread_rng(), &self.delays.fast);
        tokio::time::sleep(delay).await;

        compute_fast_score(&mut rand::thread_rng(), website, business_name)
    }

    /// Full scan: its own latency, then a complete fast scan, then refinement.
    pub async fn full_score(&self, website: &str, business_name: &str) -> FullScore {
        let delay = sample_delay(&mut rand::thread_rng(), &self.delays.full);
        tokio::time::sleep(delay).await;

        let fast = self.fast_score(website, business_name).await;
        refine_to_full_score(&mut rand::thread_rng(), fast)
    }
}

pub fn base_score(website: &str, business_name: &str) -> f64 {
    let seed = website.chars().count() + business_name.chars().count();
    45.0 + (seed % 30) as f64
}

pub fn compute_fast_score<R: Rng + ?Sized>(
    rng: &mut R,
    website: &str,
    business_name: &str,
) -> FastScore {
    let base = base_score(website, business_name);

    let seo = (base + rng.gen::<f64>() * 15.0).min(100.0);
    let visibility = (base + rng.gen::<f64>() * 20.0).min(100.0);
    let local_presence = (base + rng.gen::<f64>() * 10.0).min(100.0);
    let reputation = (base + rng.gen::<f64>() * 18.0).min(100.0);

    // Overall comes from the unrounded sub-scores.
    let scores = ScoreComponents {
        overall_score: round1(weighted_overall(seo, visibility, local_presence, reputation)),
        seo_score: round1(seo),
        visibility_score: round1(visibility),
        local_presence_score: round1(local_presence),
        reputation_score: round1(reputation),
    };

    FastScore {
        recommendations: recommendations_for(&scores),
        scores,
    }
}

pub fn refine_to_full_score<R: Rng + ?Sized>(rng: &mut R, fast: FastScore) -> FullScore {
    let mut refine = |score: f64| round1(score + rng.gen::<f64>() * 5.0).min(100.0);

    let seo = refine(fast.scores.seo_score);
    let visibility = refine(fast.scores.visibility_score);
    let local_presence = refine(fast.scores.local_presence_score);
    let reputation = refine(fast.scores.reputation_score);

    let scores = ScoreComponents {
        overall_score: round1(weighted_overall(seo, visibility, local_presence, reputation)),
        seo_score: seo,
        visibility_score: visibility,
        local_presence_score: local_presence,
        reputation_score: reputation,
    };

    FullScore {
        competitor_benchmarks: competitor_benchmarks(rng, scores.overall_score),
        scores,
        recommendations: fast.recommendations,
    }
}

pub fn weighted_overall(seo: f64, visibility: f64, local_presence: f64, reputation: f64) -> f64 {
    seo * SEO_WEIGHT
        + visibility * VISIBILITY_WEIGHT
        + local_presence * LOCAL_PRESENCE_WEIGHT
        + reputation * REPUTATION_WEIGHT
}

fn recommendations_for(scores: &ScoreComponents) -> Vec<Recommendation> {
    let candidates = [
        (
            scores.seo_score,
            "Optimize Meta Tags & Descriptions",
            "Your website is missing critical meta descriptions and title tags that help search engines understand your content. Adding these can improve your search rankings by 15-25%.",
            Impact::High,
        ),
        (
            scores.visibility_score,
            "Claim Your Google Business Profile",
            "Your business doesn't appear prominently in local search results. Claiming and optimizing your Google Business Profile can increase local visibility by 40%.",
            Impact::High,
        ),
        (
            scores.local_presence_score,
            "Build Local Citations",
            "Your business information is inconsistent across online directories. Standardizing your NAP (Name, Address, Phone) across platforms improves local SEO.",
            Impact::Medium,
        ),
        (
            scores.reputation_score,
            "Generate More Customer Reviews",
            "You have fewer reviews than competitors. Implementing a review generation strategy can boost trust and conversion rates by 30%.",
            Impact::High,
        ),
    ];

    candidates
        .into_iter()
        .filter(|(score, ..)| *score < RECOMMENDATION_THRESHOLD)
        .take(MAX_RECOMMENDATIONS)
        .map(|(_, title, description, impact)| Recommendation {
            title: title.to_string(),
            description: description.to_string(),
            impact,
        })
        .collect()
}

fn competitor_benchmarks<R: Rng + ?Sized>(rng: &mut R, your_score: f64) -> Vec<CompetitorBenchmark> {
    let competitors = [
        (
            "Top Local Competitor",
            (your_score + 10.0 + rng.gen::<f64>() * 15.0).min(100.0),
        ),
        (
            "Industry Leader",
            (your_score + 20.0 + rng.gen::<f64>() * 10.0).min(100.0),
        ),
        // Not capped: the regional average can sit on either side of you.
        ("Regional Average", your_score - 5.0 + rng.gen::<f64>() * 10.0),
    ];

    competitors
        .into_iter()
        .map(|(name, score)| {
            let competitor_score = round1(score);
            CompetitorBenchmark {
                competitor_name: name.to_string(),
                competitor_score,
                your_score,
                gap: round1(competitor_score - your_score),
            }
        })
        .collect()
}

fn sample_delay<R: Rng + ?Sized>(rng: &mut R, window: &Range<Duration>) -> Duration {
    if window.start >= window.end {
        return window.start;
    }
    rng.gen_range(window.clone())
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
