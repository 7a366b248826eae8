// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt mutation and template expansion.
//!
//! A mutation appends a style modifier, a few adjectives and one or two
//! quality enhancers to a base prompt. Every random choice is drawn from an
//! RNG seeded with the recorded seed, so the same seed and options always
//! produce the same prompt.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use cadence_core::types::{
    AppliedMutation, MutationKind, MutationOptions, MutationRecord, PromptTemplate, StyleCategory,
};
use cadence_core::{CadenceError, Clock, TemplateStore};

/// Adjectives appended per prompt never exceed this, whatever `maxAdjectives` says.
pub const MAX_ADJECTIVES: usize = 4;

/// Seeds drawn when none is given fall in `0..SEED_RANGE`.
pub const SEED_RANGE: u64 = 1_000_000;

const ANIME: &[&str] = &[
    "anime style",
    "manga style",
    "cel-shaded",
    "vibrant colors",
    "highly detailed anime",
    "Studio Ghibli style",
    "modern anime aesthetic",
    "kawaii style",
    "shounen anime",
    "seinen anime",
];

const PHOTOREALISTIC: &[&str] = &[
    "photorealistic",
    "ultra realistic",
    "highly detailed",
    "8k resolution",
    "professional photography",
    "cinematic lighting",
    "DSLR quality",
    "hyperrealistic",
    "studio lighting",
    "natural lighting",
];

const ARTISTIC: &[&str] = &[
    "oil painting",
    "watercolor",
    "digital art",
    "concept art",
    "fantasy art",
    "impressionist style",
    "art nouveau",
    "cyberpunk aesthetic",
    "steampunk style",
    "gothic art",
];

const CINEMATIC: &[&str] = &[
    "cinematic shot",
    "movie still",
    "dramatic lighting",
    "bokeh effect",
    "golden hour",
    "film grain",
    "anamorphic lens",
    "depth of field",
    "atmospheric",
    "epic composition",
];

const QUALITY_ENHANCERS: &[&str] = &[
    "masterpiece",
    "best quality",
    "high quality",
    "extremely detailed",
    "intricate details",
    "perfect composition",
    "award winning",
    "trending on artstation",
];

const ADJECTIVE_POOLS: &[(&str, &[&str])] = &[
    (
        "mood",
        &[
            "serene",
            "dramatic",
            "mysterious",
            "vibrant",
            "melancholic",
            "cheerful",
            "intense",
            "peaceful",
            "dynamic",
            "ethereal",
        ],
    ),
    (
        "lighting",
        &[
            "soft",
            "harsh",
            "warm",
            "cool",
            "bright",
            "dim",
            "dramatic",
            "natural",
            "artificial",
            "ambient",
        ],
    ),
    (
        "color",
        &[
            "vivid",
            "muted",
            "pastel",
            "saturated",
            "desaturated",
            "monochrome",
            "colorful",
            "neutral",
            "bold",
            "subtle",
        ],
    ),
    (
        "detail",
        &[
            "intricate",
            "simple",
            "complex",
            "minimalist",
            "ornate",
            "refined",
            "rough",
            "smooth",
            "textured",
            "clean",
        ],
    ),
];

fn style_modifiers(category: StyleCategory) -> &'static [&'static str] {
    match category {
        StyleCategory::Anime => ANIME,
        StyleCategory::Photorealistic => PHOTOREALISTIC,
        StyleCategory::Artistic => ARTISTIC,
        StyleCategory::Cinematic => CINEMATIC,
    }
}

/// A mutated prompt and the record needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutatedPrompt {
    pub prompt: String,
    pub record: MutationRecord,
}

/// Mutates `base` according to `options`.
pub fn mutate_prompt(base: &str, options: &MutationOptions) -> MutatedPrompt {
    let seed = options
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..SEED_RANGE));
    let mut rng = StdRng::seed_from_u64(seed);

    let original = base.trim();
    let mut prompt = original.to_string();
    let mut mutations = Vec::new();
    let mut push = |prompt: &mut String, kind: MutationKind, pool: Option<&str>, value: &str| {
        prompt.push_str(", ");
        prompt.push_str(value);
        mutations.push(AppliedMutation {
            kind,
            pool: pool.map(str::to_string),
            value: value.to_string(),
        });
    };

    if options.add_style_modifier() {
        if let Some(modifier) = style_modifiers(options.style_category()).choose(&mut rng) {
            push(&mut prompt, MutationKind::Style, None, *modifier);
        }
    }

    if options.add_adjectives() {
        for _ in 0..options.max_adjectives().min(MAX_ADJECTIVES) {
            let Some((pool, words)) = ADJECTIVE_POOLS.choose(&mut rng) else {
                break;
            };
            if let Some(word) = words.choose(&mut rng) {
                push(&mut prompt, MutationKind::Adjective, Some(*pool), *word);
            }
        }
    }

    if options.add_quality() {
        let count = rng.gen_range(1..=2);
        for enhancer in QUALITY_ENHANCERS.choose_multiple(&mut rng, count) {
            push(&mut prompt, MutationKind::Quality, None, *enhancer);
        }
    }

    MutatedPrompt {
        prompt,
        record: MutationRecord {
            template_id: None,
            template_name: None,
            original_prompt: original.to_string(),
            mutations,
            seed,
        },
    }
}

/// `count` variations of `base`. Variation `i` uses seed `base_seed + i`,
/// where `base_seed` is `options.seed` or a fresh draw.
pub fn generate_variations(
    base: &str,
    count: usize,
    options: &MutationOptions,
) -> Vec<MutatedPrompt> {
    let base_seed = options
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..SEED_RANGE));
    (0..count as u64)
        .map(|i| {
            let seeded = MutationOptions {
                seed: Some(base_seed + i),
                ..options.clone()
            };
            mutate_prompt(base, &seeded)
        })
        .collect()
}

/// Expands stored prompt templates.
pub struct TemplateExpander {
    templates: Arc<dyn TemplateStore>,
    clock: Arc<dyn Clock>,
}

impl TemplateExpander {
    pub fn new(templates: Arc<dyn TemplateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { templates, clock }
    }

    /// Mutates the template's base prompt and counts the use.
    ///
    /// Options are the template defaults, then the template's style category,
    /// then `overrides`, each layer winning over the previous one.
    pub async fn expand(
        &self,
        template_id: &str,
        overrides: &MutationOptions,
    ) -> Result<MutatedPrompt, CadenceError> {
        let template = self.load(template_id).await?;

        let options = template
            .default_options
            .overlay(&MutationOptions {
                style_category: Some(template.style_category),
                ..Default::default()
            })
            .overlay(overrides);

        let mut mutated = mutate_prompt(&template.base_prompt, &options);
        self.templates
            .record_template_use(&template.id, self.clock.now())
            .await?;

        debug!(
            template_id = %template.id,
            seed = mutated.record.seed,
            "expanded prompt template"
        );
        mutated.record.template_id = Some(template.id);
        mutated.record.template_name = Some(template.name);
        Ok(mutated)
    }

    /// The template's base prompt, unmutated and uncounted.
    pub async fn base_prompt(&self, template_id: &str) -> Result<String, CadenceError> {
        Ok(self.load(template_id).await?.base_prompt)
    }

    async fn load(&self, template_id: &str) -> Result<PromptTemplate, CadenceError> {
        self.templates
            .get_template(template_id)
            .await?
            .ok_or_else(|| CadenceError::TemplateNotFound {
                id: template_id.to_string(),
            })
    }
}
