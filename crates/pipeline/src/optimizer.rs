use std::sync::Arc;
use std::time::Instant;

use blocks::{Block, BlockKind, DropReason, DroppedBlock, total_tokens};
use cache::{CacheKey, KeyMaterial, MemoryCache, SingleFlight};
use compress::{Compressor, GateConfig, compress_blocks};
use config::Config;
use futures::FutureExt;
use semantic::{Embedder, SelectionParams, VectorStore, select};
use tokenizer::TokenCounter;

use crate::Error;
use crate::canonicalize::canonicalize;
use crate::heuristics;
use crate::request::OptimizeRequest;
use crate::stats::{OptimizeStats, StageTimings, compression_ratio, route_label};
use crate::validate::{ValidationSpec, check, describe};

/// Result of a successful optimization run.
#[derive(Debug, Clone)]
pub struct Optimized {
    /// The budget-conforming block list, in timestamp order.
    pub blocks: Vec<Block>,
    /// Optimization statistics.
    pub stats: OptimizeStats,
    /// Every block that was removed, with the reason.
    pub dropped: Vec<DroppedBlock>,
}

/// Finalized output as stored in the cache.
#[derive(Debug, Clone)]
struct CachedRun {
    blocks: Vec<Block>,
    dropped: Vec<DroppedBlock>,
    tokens_before: usize,
    semantic_changed: bool,
    compression_changed: bool,
    fallback_used: bool,
    fallback_path: Vec<String>,
    faithfulness_score: Option<f32>,
    degraded: Vec<String>,
}

/// What one semantic-plus-compression pass did to the block list.
#[derive(Debug, Default)]
struct PassOutcome {
    dropped: Vec<DroppedBlock>,
    degraded: Vec<String>,
    faithfulness: Option<f32>,
    semantic_changed: bool,
    compression_changed: bool,
}

/// Builder wiring the optional collaborators into an [`Optimizer`].
#[derive(Default)]
pub struct OptimizerBuilder {
    embedder: Option<Arc<dyn Embedder>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    compressor: Option<Arc<dyn Compressor>>,
}

impl OptimizerBuilder {
    /// Start with no collaborators: heuristics and extractive compression
    /// only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this embedding service for semantic selection.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Pull selection candidates from this vector store.
    pub fn with_vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Use this learned compressor before the extractive fallback.
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    /// Build the optimizer. Tokenizer and cache sizing come from the
    /// configuration; per-run options are read again on every `run` call.
    pub fn build(self, config: &Config) -> Optimizer {
        Optimizer {
            counter: Arc::new(TokenCounter::new(config.tokenizer.model_map.clone())),
            cache_store: MemoryCache::new(config.cache.max_entries, config.cache.ttl),
            flight: SingleFlight::new(),
            embedder: self.embedder,
            vector_store: self.vector_store,
            compressor: self.compressor,
        }
    }
}

/// The orchestrator: drives the stages in order, degrades on collaborator
/// trouble, and guarantees the output never silently drops critical
/// content.
pub struct Optimizer {
    counter: Arc<TokenCounter>,
    cache_store: MemoryCache<Arc<CachedRun>>,
    flight: SingleFlight,
    embedder: Option<Arc<dyn Embedder>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    compressor: Option<Arc<dyn Compressor>>,
}

fn ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

impl Optimizer {
    /// Start building an optimizer.
    pub fn builder() -> OptimizerBuilder {
        OptimizerBuilder::new()
    }

    /// Optimize one request under the given configuration.
    ///
    /// The only error cases are a malformed request and a validation
    /// failure that survived every fallback state; everything else
    /// degrades and is reported in stats.
    pub async fn run(
        &self,
        request: OptimizeRequest,
        config: &Config,
    ) -> Result<Optimized, Error> {
        let started = Instant::now();
        let mut timings = StageTimings::default();

        let budget = request
            .budget_override
            .unwrap_or(config.limits.target_budget_tokens);

        let stage = Instant::now();
        let canonical = canonicalize(&request, &self.counter)?;
        timings.canonicalize = ms(stage);

        let tokens_before = total_tokens(&canonical);
        let canonical_must_keep: Vec<String> = canonical
            .iter()
            .filter(|b| b.must_keep)
            .map(|b| b.content.clone())
            .collect();
        let input_fingerprints: Vec<String> = canonical
            .iter()
            .map(|b| b.fingerprint.as_str().to_string())
            .collect();

        let stage = Instant::now();
        let mut blocks = canonical;
        let heuristics_report = heuristics::run(
            &mut blocks,
            &config.heuristics,
            &self.counter,
            &request.target_model,
        );
        timings.heuristics = ms(stage);

        log::debug!(
            "heuristics done: {} blocks, {} dropped, changed={}",
            blocks.len(),
            heuristics_report.dropped.len(),
            heuristics_report.changed
        );

        let snapshot = blocks.clone();
        let spec = ValidationSpec::capture(&snapshot, canonical_must_keep, budget);

        let tokenizer_version = self.counter.version_tag(&request.target_model);
        let config_fingerprint = format!(
            "{};tenant={};override={:?}",
            config.output_fingerprint(),
            request.tenant_id,
            request.budget_override,
        );
        let key = CacheKey::digest(KeyMaterial {
            model: &request.target_model,
            tokenizer_version: &tokenizer_version,
            fingerprints: input_fingerprints.iter().map(String::as_str).collect(),
            config_fingerprint: &config_fingerprint,
        });

        let heuristics_dropped = heuristics_report.dropped;

        let stage = Instant::now();
        let (cached, cache_hit) = if config.cache.enabled {
            self.flight
                .compute_if_absent(&self.cache_store, &key, || {
                    self.produce(
                        blocks,
                        &snapshot,
                        &spec,
                        &request,
                        config,
                        budget,
                        tokens_before,
                        heuristics_dropped,
                        &mut timings,
                    )
                    .map(|result| result.map(Arc::new))
                })
                .await?
        } else {
            let run = self
                .produce(
                    blocks,
                    &snapshot,
                    &spec,
                    &request,
                    config,
                    budget,
                    tokens_before,
                    heuristics_dropped,
                    &mut timings,
                )
                .await?;
            (Arc::new(run), false)
        };
        let produced_ms = timings.semantic + timings.compression + timings.validate;
        timings.cache = (ms(stage) - produced_ms).max(0.0);

        if cache_hit {
            // The producer never ran; its timings stay zero.
            timings.semantic = 0.0;
            timings.compression = 0.0;
            timings.validate = 0.0;
        }

        let run = cached.as_ref();
        let tokens_after = total_tokens(&run.blocks);

        let stats = OptimizeStats {
            tokens_before: run.tokens_before,
            tokens_after,
            tokens_saved: run.tokens_before.saturating_sub(tokens_after),
            compression_ratio: compression_ratio(run.tokens_before, tokens_after),
            route: route_label(
                cache_hit,
                run.semantic_changed,
                run.compression_changed,
                run.fallback_used,
            ),
            cache_hit,
            fallback_used: run.fallback_used,
            latency_ms: ms(started),
            stage_timings_ms: timings,
            faithfulness_score: run.faithfulness_score,
            tokenizer_fallback: self.counter.uses_fallback(&request.target_model),
            degraded: run.degraded.clone(),
            fallback_path: run.fallback_path.clone(),
        };

        Ok(Optimized {
            blocks: run.blocks.clone(),
            stats,
            dropped: run.dropped.clone(),
        })
    }

    /// The post-cache part of the pipeline: semantic selection, compression
    /// and validation with fallback. Unexpected panics inside any stage are
    /// caught here and converted to a validation failure with a trace id.
    #[allow(clippy::too_many_arguments)]
    async fn produce(
        &self,
        blocks: Vec<Block>,
        snapshot: &[Block],
        spec: &ValidationSpec,
        request: &OptimizeRequest,
        config: &Config,
        budget: usize,
        tokens_before: usize,
        heuristics_dropped: Vec<DroppedBlock>,
        timings: &mut StageTimings,
    ) -> Result<CachedRun, Error> {
        let inner = self.produce_inner(
            blocks,
            snapshot,
            spec,
            request,
            config,
            budget,
            tokens_before,
            heuristics_dropped,
            timings,
        );

        match std::panic::AssertUnwindSafe(inner).catch_unwind().await {
            Ok(result) => result,
            Err(_) => {
                let trace_id = uuid::Uuid::new_v4().to_string();
                log::error!("pipeline stage panicked, trace {trace_id}");
                Err(Error::ValidationFailed {
                    failed: "internal".to_string(),
                    trace_id,
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn produce_inner(
        &self,
        mut blocks: Vec<Block>,
        snapshot: &[Block],
        spec: &ValidationSpec,
        request: &OptimizeRequest,
        config: &Config,
        budget: usize,
        tokens_before: usize,
        heuristics_dropped: Vec<DroppedBlock>,
        timings: &mut StageTimings,
    ) -> Result<CachedRun, Error> {
        let mut pass = self
            .optimize_pass(&mut blocks, request, config, budget, timings)
            .await;

        let mut fallback_used = false;
        let mut fallback_path = Vec::new();

        // F0: validate the optimized output.
        let stage = Instant::now();
        let mut failed = check(&blocks, spec);

        if !failed.is_empty() {
            fallback_used = true;

            // F1 repairs a pure budget overrun by undoing compression;
            // anything involving lost content goes straight to F2.
            if failed.iter().all(|f| !f.is_content_loss()) {
                fallback_path.push(format!("F0:{} -> F1", describe(&failed)));
                log::warn!("validation failed ({}), undoing compression", describe(&failed));

                for block in blocks.iter_mut() {
                    block.undo_compression();
                }
                pass.faithfulness = None;
                pass.compression_changed = false;

                failed = check(&blocks, spec);
            } else {
                fallback_path.push(format!("F0:{} -> F2", describe(&failed)));
            }
        }

        if !failed.is_empty() {
            // F2: restart from the post-heuristics snapshot with a widened
            // keep window, then rerun the budget-driven stages.
            if fallback_path.len() == 1 && fallback_path[0].ends_with("F1") {
                fallback_path.push(format!("F1:{} -> F2", describe(&failed)));
            }
            log::warn!(
                "validation failed ({}), widening kept turns and rerunning",
                describe(&failed)
            );

            blocks = snapshot.to_vec();
            let mut widened = config.clone();
            widened.heuristics.keep_last_n_turns += 2;
            heuristics::mark_last_turns(&mut blocks, widened.heuristics.keep_last_n_turns);

            pass = self
                .optimize_pass(&mut blocks, request, &widened, budget, timings)
                .await;

            failed = check(&blocks, spec);
        }

        if !failed.is_empty() {
            // F3: minimal-safe set.
            fallback_path.push(format!("F2:{} -> F3", describe(&failed)));
            log::warn!(
                "validation failed ({}), falling back to the minimal-safe set",
                describe(&failed)
            );

            let (minimal, shed) = minimal_safe(snapshot);
            blocks = minimal;
            pass.dropped.extend(shed);

            failed = check(&blocks, spec);

            if !failed.is_empty() {
                let trace_id = uuid::Uuid::new_v4().to_string();
                log::error!(
                    "validation failed after minimal-safe fallback ({}), trace {trace_id}",
                    describe(&failed)
                );
                timings.validate += ms(stage);
                return Err(Error::ValidationFailed {
                    failed: describe(&failed),
                    trace_id,
                });
            }
        }
        timings.validate += ms(stage);

        let mut dropped = heuristics_dropped;
        dropped.extend(pass.dropped);

        Ok(CachedRun {
            blocks,
            dropped,
            tokens_before,
            semantic_changed: pass.semantic_changed,
            compression_changed: pass.compression_changed,
            fallback_used,
            fallback_path,
            faithfulness_score: pass.faithfulness,
            degraded: pass.degraded,
        })
    }

    /// One semantic-selection plus compression pass over the block list.
    /// Reruns during fallback accumulate into the same stage timings.
    async fn optimize_pass(
        &self,
        blocks: &mut Vec<Block>,
        request: &OptimizeRequest,
        config: &Config,
        budget: usize,
        timings: &mut StageTimings,
    ) -> PassOutcome {
        let mut outcome = PassOutcome::default();

        let stage = Instant::now();
        if config.semantic.enabled && total_tokens(blocks) > budget {
            self.semantic_stage(blocks, request, config, budget, &mut outcome)
                .await;
        }
        timings.semantic += ms(stage);

        let stage = Instant::now();
        if config.compression.enabled && total_tokens(blocks) > budget {
            let gate_config = GateConfig {
                ratio: config.compression.ratio,
                faithfulness_threshold: config.compression.faithfulness_threshold,
                timeout: config.compression.timeout,
            };

            let gate = compress_blocks(
                blocks,
                budget.saturating_sub(config.limits.safety_margin_tokens),
                self.compressor.as_deref(),
                &gate_config,
                &self.counter,
                &request.target_model,
            )
            .await;

            if gate.learned_degraded {
                outcome.degraded.push("compressor".to_string());
            }
            outcome.faithfulness = gate.min_faithfulness;
            outcome.compression_changed = !gate.compressed.is_empty();
        }
        timings.compression += ms(stage);

        outcome
    }

    async fn semantic_stage(
        &self,
        blocks: &mut Vec<Block>,
        request: &OptimizeRequest,
        config: &Config,
        budget: usize,
        outcome: &mut PassOutcome,
    ) {
        let Some(embedder) = &self.embedder else {
            log::debug!("semantic stage skipped: no embedder wired");
            outcome.degraded.push("embedding".to_string());
            return;
        };

        let next_block_id = blocks.iter().map(|b| b.id.seq()).max().unwrap_or(0) + 1;

        let params = SelectionParams {
            budget,
            safety_margin: config.limits.safety_margin_tokens,
            tenant: &request.tenant_id,
            config: &config.semantic,
            embed_timeout: config.embedding.timeout,
            next_block_id,
        };

        match select(blocks, params, embedder.as_ref(), self.vector_store.as_deref()).await {
            Ok(selection) => {
                if selection.store_degraded {
                    outcome.degraded.push("vector-store".to_string());
                }

                let accepted = selection.accepted;
                blocks.retain(|block| {
                    let keep = block.must_keep || accepted.contains(&block.id);
                    if !keep {
                        outcome.semantic_changed = true;
                    }
                    keep
                });

                if !selection.augmented.is_empty() {
                    outcome.semantic_changed = true;
                    blocks.extend(selection.augmented);
                    blocks.sort_by_key(|b| (b.timestamp, b.id));
                }

                outcome.dropped.extend(selection.dropped);
            }
            Err(err) => {
                log::warn!("semantic stage skipped: {err}");
                outcome.degraded.push("embedding".to_string());
            }
        }
    }
}

/// The F3 set: system and developer blocks, the most recent user block,
/// every constraint block and at most one tool block by priority.
fn minimal_safe(snapshot: &[Block]) -> (Vec<Block>, Vec<DroppedBlock>) {
    let last_user_timestamp = snapshot
        .iter()
        .filter(|b| b.kind == BlockKind::User)
        .map(|b| b.timestamp)
        .max();

    let best_tool = snapshot
        .iter()
        .filter(|b| b.kind == BlockKind::Tool)
        .min_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|b| b.id);

    let mut kept = Vec::new();
    let mut shed = Vec::new();

    for block in snapshot {
        let keep = match block.kind {
            BlockKind::System | BlockKind::Developer | BlockKind::Constraint => true,
            BlockKind::User => Some(block.timestamp) == last_user_timestamp,
            BlockKind::Tool => Some(block.id) == best_tool,
            BlockKind::Assistant | BlockKind::Doc => false,
        };

        if keep {
            kept.push(block.clone());
        } else {
            shed.push(DroppedBlock::of(block, DropReason::FallbackMinimal));
        }
    }

    (kept, shed)
}
