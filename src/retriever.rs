//! Query-time retrieval and answer generation.
//!
//! A [`Retriever`] answers one question in four steps:
//!
//! 1. embed the question with the same model the index was built with;
//! 2. run an exact k-nearest-neighbour search over the snapshot;
//! 3. render the hits into a numbered, source-tagged context block;
//! 4. ask the language model to answer from that context only.
//!
//! The retriever holds no per-request state. It shares the loaded snapshot
//! and both remote clients behind `Arc`, so one instance serves every
//! concurrent request.

use std::fmt::Write;
use std::sync::Arc;

use crate::config::{Config, GenerationConfig};
use crate::embedding::{embed_query, Embedder, OpenAIEmbedder};
use crate::error::{RagError, Result};
use crate::generation::{CompletionRequest, Generator, OpenAIChat};
use crate::models::{AnswerRecord, SearchHit, TokenUsage};
use crate::store::IndexSnapshot;

const SYSTEM_PROMPT: &str = "You are an expert legal assistant.
Answer ONLY from the document extracts provided.
If the answer is not in the extracts, say clearly \"I cannot find this information in the provided documents.\"
Always cite the source (e.g. [Source: GDPR.pdf]).
Be precise and professional.";

/// Model parameters applied to every generation call.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_output_tokens: 500,
        }
    }
}

impl From<&GenerationConfig> for GenerationSettings {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

pub struct Retriever {
    snapshot: Arc<IndexSnapshot>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    settings: GenerationSettings,
}

impl Retriever {
    pub fn new(
        snapshot: Arc<IndexSnapshot>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        settings: GenerationSettings,
    ) -> Self {
        if embedder.model_name() != snapshot.embedding_model() {
            tracing::warn!(
                index_model = snapshot.embedding_model(),
                query_model = embedder.model_name(),
                "query embedding model differs from the model the index was built with"
            );
        }
        Self {
            snapshot,
            embedder,
            generator,
            settings,
        }
    }

    /// Load the snapshot from `[index].dir` and connect both OpenAI clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        let snapshot = IndexSnapshot::load(&config.index.dir)?;
        let embedder = OpenAIEmbedder::new(&config.embedding)?;
        let generator = OpenAIChat::new(&config.generation)?;
        Ok(Self::new(
            Arc::new(snapshot),
            Arc::new(embedder),
            Arc::new(generator),
            GenerationSettings::from(&config.generation),
        ))
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// Return the `k` chunks nearest to `query`, ranked from 1.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let rows = self.snapshot.index().search(&vector, k)?;

        let hits = rows
            .into_iter()
            .enumerate()
            .map(|(i, (row, distance))| {
                let chunk = self.snapshot.chunk(row).cloned().ok_or_else(|| {
                    RagError::IndexCorrupt(format!("index row {} has no chunk", row))
                })?;
                Ok(SearchHit {
                    chunk,
                    distance,
                    rank: i + 1,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(k, hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }

    /// Generate an answer to `query` grounded in `hits`.
    ///
    /// `model` overrides the configured generation model for this call.
    pub async fn generate_answer(
        &self,
        query: &str,
        hits: &[SearchHit],
        model: Option<&str>,
    ) -> Result<AnswerRecord> {
        let model = model.unwrap_or(self.settings.model.as_str()).to_string();
        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: user_prompt(&build_context(hits), query),
            model: model.clone(),
            max_output_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        };

        let completion = self.generator.complete(&request).await?;
        tracing::info!(
            model = %model,
            chunks = hits.len(),
            total_tokens = completion.total_tokens,
            "answer generated"
        );

        Ok(AnswerRecord {
            query: query.to_string(),
            answer: completion.text,
            sources: hits.iter().map(|h| h.chunk.source.clone()).collect(),
            num_chunks_used: hits.len(),
            model,
            tokens_used: TokenUsage {
                prompt: completion.prompt_tokens,
                completion: completion.completion_tokens,
                total: completion.total_tokens,
            },
        })
    }

    /// Search, then answer from the hits. Either step failing fails the call.
    pub async fn ask(&self, query: &str, k: usize, model: Option<&str>) -> Result<AnswerRecord> {
        let hits = self.search(query, k).await?;
        self.generate_answer(query, &hits, model).await
    }
}

/// Render hits as numbered extracts tagged with their source.
pub fn build_context(hits: &[SearchHit]) -> String {
    let mut context = String::new();
    for (n, hit) in hits.iter().enumerate() {
        let _ = write!(
            context,
            "[Extract {} - Source: {}]\n{}\n\n",
            n + 1,
            hit.chunk.source,
            hit.chunk.text
        );
    }
    context
}

fn user_prompt(context: &str, query: &str) -> String {
    format!(
        "Context (extracts from legal documents):\n\n{}\n\nQuestion: {}\n\nAnswer clearly and cite your sources.",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::Completion;
    use crate::index::VectorIndex;
    use crate::models::Chunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Maps the first word of each text to a fixed 2-d point.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.split_whitespace().next() {
                    Some("consent") => vec![1.0, 0.0],
                    Some("erasure") => vec![0.0, 1.0],
                    _ => vec![5.0, 5.0],
                })
                .collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(RagError::EmbeddingService("unreachable".to_string()))
        }
    }

    /// Records every request and replies with a canned completion.
    struct ScriptedGenerator {
        requests: Mutex<Vec<CompletionRequest>>,
        fail: bool,
    }

    impl ScriptedGenerator {
        fn new(fail: bool) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(RagError::Generation("model overloaded".to_string()));
            }
            Ok(Completion {
                text: "Consent must be freely given. [Source: gdpr.pdf]".to_string(),
                prompt_tokens: 120,
                completion_tokens: 30,
                total_tokens: 150,
            })
        }
    }

    fn chunk(text: &str, source: &str, chunk_id: usize) -> Chunk {
        Chunk {
            text: text.to_string(),
            chunk_id,
            start_word: 0,
            end_word: text.split_whitespace().count(),
            source: source.to_string(),
        }
    }

    fn snapshot() -> Arc<IndexSnapshot> {
        let index = VectorIndex::build(vec![
            vec![0.9, 0.1],
            vec![0.1, 0.9],
            vec![3.0, 3.0],
        ])
        .unwrap();
        let chunks = vec![
            chunk("Consent means any freely given indication.", "gdpr.pdf", 0),
            chunk("The right to erasure applies when...", "gdpr.pdf", 1),
            chunk("Contracts bind the parties.", "civil.txt", 0),
        ];
        Arc::new(IndexSnapshot::new(index, chunks, "keyword").unwrap())
    }

    fn retriever(embedder: Arc<dyn Embedder>, generator: Arc<ScriptedGenerator>) -> Retriever {
        Retriever::new(snapshot(), embedder, generator, GenerationSettings::default())
    }

    #[tokio::test]
    async fn test_search_maps_rows_to_chunks() {
        let r = retriever(Arc::new(KeywordEmbedder), Arc::new(ScriptedGenerator::new(false)));
        let hits = r.search("consent requirements", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
        assert!(hits[0].chunk.text.starts_with("Consent"));
        assert!(hits[1].chunk.text.contains("erasure"));
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[tokio::test]
    async fn test_search_k_above_len_returns_all() {
        let r = retriever(Arc::new(KeywordEmbedder), Arc::new(ScriptedGenerator::new(false)));
        let hits = r.search("erasure", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.chunk_id, 1);
    }

    #[tokio::test]
    async fn test_five_chunks_top_three_ranked() {
        let index = VectorIndex::build(vec![
            vec![1.0, 0.0],
            vec![0.8, 0.2],
            vec![0.0, 1.0],
            vec![0.5, 0.5],
            vec![3.0, 3.0],
        ])
        .unwrap();
        let chunks = (0..5)
            .map(|i| chunk(&format!("article {}", i), "code.pdf", i))
            .collect();
        let snapshot = Arc::new(IndexSnapshot::new(index, chunks, "keyword").unwrap());
        let r = Retriever::new(
            snapshot,
            Arc::new(KeywordEmbedder),
            Arc::new(ScriptedGenerator::new(false)),
            GenerationSettings::default(),
        );

        let hits = r.search("consent", 3).await.unwrap();
        assert_eq!(hits.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(
            hits.iter().map(|h| h.chunk.chunk_id).collect::<Vec<_>>(),
            vec![0, 1, 3]
        );
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_build_context_format() {
        let hits = vec![
            SearchHit {
                chunk: chunk("first text", "a.pdf", 0),
                distance: 0.1,
                rank: 1,
            },
            SearchHit {
                chunk: chunk("second text", "b.txt", 3),
                distance: 0.2,
                rank: 2,
            },
        ];
        assert_eq!(
            build_context(&hits),
            "[Extract 1 - Source: a.pdf]\nfirst text\n\n[Extract 2 - Source: b.txt]\nsecond text\n\n"
        );
        assert_eq!(build_context(&[]), "");
    }

    #[tokio::test]
    async fn test_ask_builds_answer_record() {
        let generator = Arc::new(ScriptedGenerator::new(false));
        let r = retriever(Arc::new(KeywordEmbedder), generator.clone());
        let record = r.ask("consent", 2, None).await.unwrap();

        assert_eq!(record.query, "consent");
        assert_eq!(record.num_chunks_used, 2);
        assert_eq!(record.sources, vec!["gdpr.pdf", "gdpr.pdf"]);
        assert_eq!(record.model, "gpt-4o-mini");
        assert_eq!(
            record.tokens_used,
            TokenUsage {
                prompt: 120,
                completion: 30,
                total: 150
            }
        );

        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let sent = &requests[0];
        assert!(sent.system.contains("ONLY"));
        assert!(sent.user.contains("[Extract 1 - Source: gdpr.pdf]"));
        assert!(sent.user.contains("Question: consent"));
        assert_eq!(sent.max_output_tokens, 500);
        assert!((sent.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_model_override() {
        let generator = Arc::new(ScriptedGenerator::new(false));
        let r = retriever(Arc::new(KeywordEmbedder), generator.clone());
        let record = r.ask("consent", 1, Some("gpt-4")).await.unwrap();
        assert_eq!(record.model, "gpt-4");
        assert_eq!(generator.requests.lock().unwrap()[0].model, "gpt-4");
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_generation() {
        let generator = Arc::new(ScriptedGenerator::new(false));
        let r = retriever(Arc::new(FailingEmbedder), generator.clone());
        let err = r.ask("consent", 3, None).await.unwrap_err();
        assert!(matches!(err, RagError::EmbeddingService(_)));
        assert!(generator.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_has_no_partial_result() {
        let r = retriever(Arc::new(KeywordEmbedder), Arc::new(ScriptedGenerator::new(true)));
        let err = r.ask("consent", 3, None).await.unwrap_err();
        assert!(matches!(err, RagError::Generation(_)));
    }
}
