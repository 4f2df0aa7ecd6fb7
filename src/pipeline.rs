use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::augment::{AugmentationPlan, Backgrounds};
use crate::compose::{Composite, compose_line};
use crate::config::SynthConfig;
use crate::error::SynthError;
use crate::postprocess::PostProcessor;
use crate::quality::QualityGate;
use crate::report::{FailureKind, FailureRecord};
use crate::sample::{DatasetWriter, LabelRecord, SampleMetadata, emit};
use crate::sources::LineSource;

/// splitmix64 finalizer over the base seed and index; stable across platforms.
pub fn derive_seed(base: u64, index: u64) -> u64 {
    let mut z = base
        .wrapping_add(index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// A sample that could not be built, with the retries spent on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub failure: FailureRecord,
    pub retries: usize,
}

#[derive(Debug)]
pub enum SampleOutcome {
    Written { record: LabelRecord, retries: usize },
    Failed { failure: FailureRecord, retries: usize },
}

/// Everything needed to turn a sample index into an accepted sample.
#[derive(Clone)]
pub struct SamplePipeline {
    config: Arc<SynthConfig>,
    source: Arc<dyn LineSource>,
    backgrounds: Arc<Backgrounds>,
    post: PostProcessor,
    gate: QualityGate,
}

/// An accepted composite before it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Accepted {
    pub composite: Composite,
    pub metadata: SampleMetadata,
    pub retries: usize,
}

impl SamplePipeline {
    pub fn new(
        config: Arc<SynthConfig>,
        source: Arc<dyn LineSource>,
        backgrounds: Arc<Backgrounds>,
    ) -> Self {
        let gate = QualityGate::new(config.quality.clone());
        let post = PostProcessor::new(config.postprocess.clone());
        Self {
            config,
            source,
            backgrounds,
            post,
            gate,
        }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Builds sample `index` without writing it. Quality rejections are
    /// retried with a fresh augmentation plan up to `retry_limit` times.
    pub fn build(&self, index: u64) -> Result<Accepted, Rejection> {
        let generation = &self.config.generation;
        let seed = derive_seed(generation.base_seed, index);
        let mut rng = StdRng::seed_from_u64(seed);
        let fail = |kind, message: String, retries| Rejection {
            failure: FailureRecord {
                index,
                kind,
                message,
            },
            retries,
        };

        let Some(text) = self.source.produce_text(index, &mut rng) else {
            return Err(fail(FailureKind::NoText, "source produced no text".to_string(), 0));
        };
        let glyphs = self.source.resolve_glyph_source(&mut rng);
        let style = glyphs.style().map(str::to_string);
        let composite = compose_line(&text, &glyphs, &self.config.layout, &mut rng)
            .map_err(|err| fail(FailureKind::Compose, err.to_string(), 0))?;

        let attempts = if generation.augment {
            generation.retry_limit + 1
        } else {
            1
        };
        let mut last_error = None;
        for attempt in 0..attempts {
            let mut attempt_rng = StdRng::seed_from_u64(derive_seed(seed, attempt as u64 + 1));
            let plan = if generation.augment {
                AugmentationPlan::sample(&self.config.augment, self.backgrounds.len(), &mut attempt_rng)
            } else {
                AugmentationPlan::default()
            };
            let augmented = plan.apply(composite.clone(), &self.backgrounds);
            let (candidate, shaping) = self.post.apply(augmented, &mut attempt_rng);
            match self.gate.inspect(&candidate) {
                Ok(()) => {
                    let metadata = SampleMetadata {
                        index,
                        seed,
                        language: self.source.language().to_string(),
                        generator: self.source.kind(),
                        style,
                        attempts: attempt as u32 + 1,
                        stages: plan
                            .stage_names()
                            .into_iter()
                            .chain(shaping)
                            .map(str::to_string)
                            .collect(),
                        substitutions: Vec::new(),
                        dropped: Vec::new(),
                    };
                    return Ok(Accepted {
                        composite: candidate,
                        metadata,
                        retries: attempt,
                    });
                }
                Err(err) => {
                    debug!("sample {} attempt {} rejected: {}", index, attempt + 1, err);
                    last_error = Some(err);
                }
            }
        }
        let message = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "rejected".to_string());
        warn!("dropping sample {} after {} attempts: {}", index, attempts, message);
        Err(fail(FailureKind::Rejected, message, attempts - 1))
    }

    /// Builds sample `index` and hands it to `writer`.
    pub fn produce(&self, index: u64, writer: &mut dyn DatasetWriter) -> SampleOutcome {
        let accepted = match self.build(index) {
            Ok(accepted) => accepted,
            Err(Rejection { failure, retries }) => {
                return SampleOutcome::Failed { failure, retries };
            }
        };
        let Accepted {
            composite,
            metadata,
            retries,
        } = accepted;
        match emit(composite, metadata, self.config.generation.include_boxes, writer) {
            Ok(record) => SampleOutcome::Written { record, retries },
            Err(err) => {
                let err = SynthError::from(err);
                warn!("sample {} not stored: {}", index, err);
                SampleOutcome::Failed {
                    failure: FailureRecord {
                        index,
                        kind: FailureKind::Storage,
                        message: err.to_string(),
                    },
                    retries,
                }
            }
        }
    }
}
