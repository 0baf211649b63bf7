//! Forge Agent - Retrieval-grounded idea synthesis
//!
//! This crate implements the synthesis pipeline: embed the prize text,
//! retrieve the nearest showcase projects from the vector store, ground a
//! single generative call on those neighbors, and return the synthesized
//! idea together with the cited records.
//!
//! Author: hephaex@gmail.com

use forge_core::{
    AppConfig, ChatMessage, ForgeError, IdeaSynthesis, LlmClient, Result, SearchHit,
};
use forge_vector::{EmbeddingClient, SearchParams, VectorSearch};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

pub mod cache;
pub mod llm;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cache::{CacheConfig, CacheStatsReport, EmbeddingCache};
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};

// ============================================================================
// Configuration
// ============================================================================

/// Idea agent configuration
#[derive(Debug, Clone)]
pub struct IdeaAgentConfig {
    /// Collection holding showcase project records
    pub collection: String,

    /// Number of neighbors retrieved as grounding context
    pub top_k: usize,

    /// Minimum similarity score for a neighbor to be cited
    pub score_threshold: Option<f32>,

    /// Maximum grounding context length in the prompt (characters)
    pub max_context_length: usize,

    /// Timeout for the embedding call
    pub embed_timeout: Duration,

    /// Timeout for the vector search call
    pub search_timeout: Duration,

    /// Timeout for the generative call
    pub generate_timeout: Duration,
}

impl Default for IdeaAgentConfig {
    fn default() -> Self {
        Self {
            collection: "showcase_projects".to_string(),
            top_k: 5,
            score_threshold: None,
            max_context_length: 6000,
            embed_timeout: Duration::from_secs(15),
            search_timeout: Duration::from_secs(10),
            generate_timeout: Duration::from_secs(60),
        }
    }
}

impl IdeaAgentConfig {
    /// Derive the agent configuration from the application config
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            collection: config.vector.collection.clone(),
            top_k: config.agent.top_k,
            score_threshold: config.agent.score_threshold,
            max_context_length: config.agent.max_context_length,
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            search_timeout: Duration::from_secs(config.vector.timeout_secs),
            generate_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }
}

// ============================================================================
// Idea Agent
// ============================================================================

/// Orchestrates the embed -> search -> generate pipeline.
///
/// Holds no per-request state; clones of the inner `Arc`s are safe to share
/// across concurrent requests. Dropping the request future cancels any
/// in-flight backend call.
pub struct IdeaAgent {
    embedder: Arc<dyn EmbeddingClient>,
    search: Arc<dyn VectorSearch>,
    llm: Arc<dyn LlmClient>,
    embedding_cache: EmbeddingCache,
    config: IdeaAgentConfig,
}

impl IdeaAgent {
    /// Create a new agent
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        search: Arc<dyn VectorSearch>,
        llm: Arc<dyn LlmClient>,
        config: IdeaAgentConfig,
    ) -> Self {
        Self {
            embedder,
            search,
            llm,
            embedding_cache: EmbeddingCache::new(),
            config,
        }
    }

    /// Replace the embedding cache
    pub fn with_embedding_cache(mut self, cache: EmbeddingCache) -> Self {
        self.embedding_cache = cache;
        self
    }

    /// Cache hit/miss counters for the ops surface
    pub fn cache_stats(&self) -> CacheStatsReport {
        self.embedding_cache.stats()
    }

    /// Synthesize a new project idea from free-text prize description.
    ///
    /// The steps run strictly in sequence: the search needs the embedding,
    /// the generative call needs both. An empty search result is not a
    /// failure - synthesis proceeds with no grounding context. Each stage
    /// error keeps its own type so the boundary can map it precisely.
    pub async fn generate_idea_from_prize(&self, prize_text: &str) -> Result<IdeaSynthesis> {
        let started = Instant::now();
        tracing::info!(chars = prize_text.len(), "idea synthesis started");

        // 1. Embed the prize text, consulting the cache first
        let embedding = match self.embedding_cache.get(prize_text).await {
            Some(vector) => vector,
            None => {
                let vector = timeout(self.config.embed_timeout, self.embedder.embed(prize_text))
                    .await
                    .map_err(|_| ForgeError::Timeout {
                        stage: "embedding",
                        timeout_ms: self.config.embed_timeout.as_millis() as u64,
                    })??;
                self.embedding_cache.put(prize_text, vector.clone()).await;
                vector
            }
        };
        tracing::debug!(dimension = embedding.len(), "prize text embedded");

        // 2. Retrieve the nearest showcase projects
        let mut params = SearchParams::new(embedding, self.config.top_k);
        if let Some(threshold) = self.config.score_threshold {
            params = params.with_score_threshold(threshold);
        }

        let hits = timeout(
            self.config.search_timeout,
            self.search.search(&self.config.collection, params),
        )
        .await
        .map_err(|_| ForgeError::Timeout {
            stage: "vector search",
            timeout_ms: self.config.search_timeout.as_millis() as u64,
        })??;
        tracing::debug!(neighbors = hits.len(), "nearest projects retrieved");

        // 3. Ground the prompt on the neighbors
        let messages = self.build_messages(prize_text, &hits);

        // 4. One generative call
        let raw = timeout(self.config.generate_timeout, self.llm.generate(&messages))
            .await
            .map_err(|_| ForgeError::Timeout {
                stage: "generation",
                timeout_ms: self.config.generate_timeout.as_millis() as u64,
            })??;

        // 5. Trim and assemble
        let content = raw.trim().to_string();
        if let Some(title) = extract_title(&content) {
            tracing::debug!(%title, "idea synthesized");
        }

        let similar_projects = hits.into_iter().map(|hit| hit.payload).collect();

        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "idea synthesis finished"
        );

        Ok(IdeaSynthesis {
            content,
            similar_projects,
        })
    }

    /// Build the role-tagged prompt with the prize text and neighbor context
    fn build_messages(&self, prize_text: &str, hits: &[SearchHit]) -> Vec<ChatMessage> {
        let mut builder = GroundingPromptBuilder::new()
            .system(
                "You are a hackathon mentor who invents fresh, buildable project ideas. \
                 Ground your suggestion in the prize requirements and the prior projects \
                 provided as context, but never copy an existing project.",
            )
            .prize(prize_text)
            .add_instruction("Respond with exactly two lines.")
            .add_instruction("First line: `Title: <a short project name>`.")
            .add_instruction("Second line: `Pitch: <one sentence describing the idea>`.");

        let mut total_length = 0;
        for (i, hit) in hits.iter().enumerate() {
            let section = format!(
                "[{}] {} - {}",
                i + 1,
                hit.payload.title,
                hit.payload.description
            );
            if total_length + section.len() > self.config.max_context_length {
                break;
            }
            total_length += section.len();
            builder = builder.add_context(section);
        }

        builder.build()
    }
}

/// Pull the `Title:` line out of a synthesized idea, when present.
pub fn extract_title(content: &str) -> Option<&str> {
    let re = regex::Regex::new(r"(?m)^Title:\s*(\S.*)$").ok()?;
    re.captures(content)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim_end())
}

// ============================================================================
// Prompt Builder
// ============================================================================

/// Builder for the grounded synthesis prompt
pub struct GroundingPromptBuilder {
    system_instruction: String,
    context_sections: Vec<String>,
    prize: String,
    instructions: Vec<String>,
}

impl GroundingPromptBuilder {
    /// Create a new prompt builder
    pub fn new() -> Self {
        Self {
            system_instruction: String::new(),
            context_sections: Vec::new(),
            prize: String::new(),
            instructions: Vec::new(),
        }
    }

    /// Set system instruction
    pub fn system(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    /// Add a grounding context section
    pub fn add_context(mut self, context: impl Into<String>) -> Self {
        self.context_sections.push(context.into());
        self
    }

    /// Set the prize text
    pub fn prize(mut self, text: impl Into<String>) -> Self {
        self.prize = text.into();
        self
    }

    /// Add an output instruction
    pub fn add_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instructions.push(instruction.into());
        self
    }

    /// Build the role-tagged message list
    pub fn build(self) -> Vec<ChatMessage> {
        let mut user_content = String::new();

        if !self.context_sections.is_empty() {
            user_content.push_str("<context>\n");
            for section in &self.context_sections {
                user_content.push_str(section);
                user_content.push_str("\n\n");
            }
            user_content.push_str("</context>\n\n");
        }

        user_content.push_str("<prize>\n");
        user_content.push_str(&self.prize);
        user_content.push_str("\n</prize>\n\n");

        if !self.instructions.is_empty() {
            user_content.push_str("<instructions>\n");
            for (i, instruction) in self.instructions.iter().enumerate() {
                user_content.push_str(&format!("{}. {}\n", i + 1, instruction));
            }
            user_content.push_str("</instructions>\n");
        }

        let mut messages = Vec::with_capacity(2);
        if !self.system_instruction.is_empty() {
            messages.push(ChatMessage::system(self.system_instruction));
        }
        messages.push(ChatMessage::user(user_content));
        messages
    }
}

impl Default for GroundingPromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEmbedding, MockLlm, MockSearch};
    use forge_core::{EmbeddingError, LlmError, ProjectRecord, VectorDbError};

    fn agent_with(
        embedder: Arc<dyn EmbeddingClient>,
        search: Arc<dyn VectorSearch>,
        llm: Arc<dyn LlmClient>,
    ) -> IdeaAgent {
        IdeaAgent::new(embedder, search, llm, IdeaAgentConfig::default())
    }

    fn two_hits() -> Vec<SearchHit> {
        vec![
            SearchHit {
                id: "a".into(),
                score: 0.91,
                payload: ProjectRecord::new(
                    "Intent Pilot",
                    "Automates intent submission with session keys",
                    "https://showcase.example/intent-pilot",
                ),
            },
            SearchHit {
                id: "b".into(),
                score: 0.87,
                payload: ProjectRecord::new(
                    "Gasless Guild",
                    "Account-abstraction onboarding for DAOs",
                    "https://showcase.example/gasless-guild",
                ),
            },
        ]
    }

    #[tokio::test]
    async fn test_zero_neighbors_still_synthesizes() {
        let agent = agent_with(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(MockSearch::new(Vec::new())),
            Arc::new(MockLlm::new(
                "Title: Fresh Start\nPitch: An idea with no grounding at all.",
            )),
        );

        let result = agent.generate_idea_from_prize("anything goes").await.unwrap();

        assert!(!result.content.is_empty());
        assert!(result.similar_projects.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_with_two_neighbors() {
        let agent = agent_with(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(MockSearch::new(two_hits())),
            Arc::new(MockLlm::new(
                "  Title: Intent Autopilot\nPitch: An agent that batches user intents through 4337 paymasters.  ",
            )),
        );

        let result = agent
            .generate_idea_from_prize(
                "Build an onchain automation agent leveraging account abstraction and intents.",
            )
            .await
            .unwrap();

        assert!(result.content.contains("Title:"));
        // Trimmed, not the raw backend text
        assert!(!result.content.starts_with(' '));
        assert_eq!(result.similar_projects.len(), 2);
        for project in &result.similar_projects {
            assert!(!project.title.is_empty());
            assert!(!project.description.is_empty());
        }
    }

    #[tokio::test]
    async fn test_neighbors_reach_the_prompt() {
        let llm = Arc::new(MockLlm::new("Title: X\nPitch: Y"));
        let agent = agent_with(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(MockSearch::new(two_hits())),
            llm.clone(),
        );

        agent.generate_idea_from_prize("intents prize").await.unwrap();

        let messages = llm.last_messages();
        let user = messages
            .iter()
            .find(|m| m.role == forge_core::ChatRole::User)
            .unwrap();
        assert!(user.content.contains("Intent Pilot"));
        assert!(user.content.contains("Gasless Guild"));
        assert!(user.content.contains("intents prize"));
    }

    #[derive(Debug)]
    struct FailingEmbedding;

    #[async_trait::async_trait]
    impl EmbeddingClient for FailingEmbedding {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Err(EmbeddingError::Server)
        }

        async fn embed_batch(
            &self,
            _texts: &[String],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Server)
        }

        fn dimension(&self) -> usize {
            768
        }
    }

    struct FailingSearch;

    #[async_trait::async_trait]
    impl VectorSearch for FailingSearch {
        async fn search(
            &self,
            _collection: &str,
            _params: SearchParams,
        ) -> std::result::Result<Vec<SearchHit>, VectorDbError> {
            Err(VectorDbError::Search("backend unreachable".into()))
        }
    }

    struct FailingLlm;

    #[async_trait::async_trait]
    impl LlmClient for FailingLlm {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
        ) -> std::result::Result<String, LlmError> {
            Err(LlmError::Empty)
        }
    }

    #[tokio::test]
    async fn test_embedding_errors_stay_typed() {
        let agent = agent_with(
            Arc::new(FailingEmbedding),
            Arc::new(MockSearch::new(Vec::new())),
            Arc::new(MockLlm::new("unused")),
        );

        let err = agent.generate_idea_from_prize("prize").await.unwrap_err();
        assert!(matches!(err, ForgeError::Embedding(EmbeddingError::Server)));
    }

    #[tokio::test]
    async fn test_search_errors_stay_typed() {
        let agent = agent_with(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(FailingSearch),
            Arc::new(MockLlm::new("unused")),
        );

        let err = agent.generate_idea_from_prize("prize").await.unwrap_err();
        assert!(matches!(err, ForgeError::VectorDb(_)));
    }

    #[tokio::test]
    async fn test_generation_errors_stay_typed() {
        let agent = agent_with(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(MockSearch::new(Vec::new())),
            Arc::new(FailingLlm),
        );

        let err = agent.generate_idea_from_prize("prize").await.unwrap_err();
        assert!(matches!(err, ForgeError::Llm(LlmError::Empty)));
    }

    struct StalledLlm;

    #[async_trait::async_trait]
    impl LlmClient for StalledLlm {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
        ) -> std::result::Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn test_stalled_generation_raises_timeout() {
        let config = IdeaAgentConfig {
            generate_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let agent = IdeaAgent::new(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(MockSearch::new(Vec::new())),
            Arc::new(StalledLlm),
            config,
        );

        let err = agent.generate_idea_from_prize("prize").await.unwrap_err();
        match err {
            ForgeError::Timeout { stage, timeout_ms } => {
                assert_eq!(stage, "generation");
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_prompt_builder_shape() {
        let messages = GroundingPromptBuilder::new()
            .system("You invent ideas.")
            .add_context("[1] Prior Art - does a thing")
            .prize("Best use of intents")
            .add_instruction("Two lines only.")
            .build();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, forge_core::ChatRole::System);
        let user = &messages[1];
        assert!(user.content.contains("<context>"));
        assert!(user.content.contains("Prior Art"));
        assert!(user.content.contains("<prize>"));
        assert!(user.content.contains("Best use of intents"));
        assert!(user.content.contains("1. Two lines only."));
    }

    #[test]
    fn test_prompt_builder_without_context() {
        let messages = GroundingPromptBuilder::new()
            .prize("Best use of intents")
            .build();

        assert_eq!(messages.len(), 1);
        assert!(!messages[0].content.contains("<context>"));
        assert!(messages[0].content.contains("<prize>"));
    }

    #[test]
    fn test_extract_title() {
        let content = "Title: Intent Autopilot\nPitch: Something useful.";
        assert_eq!(extract_title(content), Some("Intent Autopilot"));

        assert_eq!(extract_title("no marker here"), None);
    }

    #[test]
    fn test_context_respects_length_budget() {
        let config = IdeaAgentConfig {
            max_context_length: 80,
            ..Default::default()
        };
        let agent = IdeaAgent::new(
            Arc::new(MockEmbedding::new(768)),
            Arc::new(MockSearch::new(Vec::new())),
            Arc::new(MockLlm::new("unused")),
            config,
        );

        let hits = two_hits();
        let messages = agent.build_messages("prize", &hits);
        let user = messages.last().unwrap();

        // Only the first neighbor fits the 80-character budget.
        assert!(user.content.contains("Intent Pilot"));
        assert!(!user.content.contains("Gasless Guild"));
    }
}
