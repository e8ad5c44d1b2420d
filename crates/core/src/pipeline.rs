use crate::config::RagConfig;
use crate::error::{ConfigError, RagError};
use crate::models::GenerationOptions;
use crate::prompt::{format_context, PromptTemplate};
use crate::traits::{Answerer, EmbeddingProvider, GenerationProvider, VectorIndex};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Clone)]
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    template: PromptTemplate,
    generator: Arc<dyn GenerationProvider>,
    k: usize,
    options: GenerationOptions,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        template: PromptTemplate,
        generator: Arc<dyn GenerationProvider>,
        k: usize,
        options: GenerationOptions,
    ) -> Self {
        Self {
            embedder,
            index,
            template,
            generator,
            k,
            options,
        }
    }

    pub fn from_config(
        config: &RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self, ConfigError> {
        tracing::info!(
            embedding_model = %config.emb_model_id,
            generation_model = %config.llm_model_id,
            k = config.k,
            "building rag pipeline"
        );
        Ok(Self::new(
            embedder,
            index,
            config.prompt_template()?,
            generator,
            config.k,
            config.generation_options(),
        ))
    }

    pub async fn render_prompt(&self, question: &str) -> Result<String, RagError> {
        let query_vector = self.embedder.embed(question).await?;
        let hits = self.index.search_vector(&query_vector, self.k).await?;
        tracing::debug!(hits = hits.len(), "retrieved context");
        Ok(self.template.render(&format_context(&hits), question))
    }

    pub async fn invoke(&self, question: &str) -> Result<String, RagError> {
        let prompt = self.render_prompt(question).await?;
        let answer = self.generator.generate(&prompt, &self.options).await?;
        Ok(answer)
    }
}

#[async_trait]
impl Answerer for RagPipeline {
    async fn answer(&self, question: &str) -> Result<String, RagError> {
        self.invoke(question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use crate::store::LocalVectorStore;
    use crate::testing::{FailingGenerator, KeywordEmbedder, RecordingGenerator};

    const CITIES: [&str; 3] = [
        "Paris is the capital of France.",
        "Lyon is a city in France.",
        "Berlin is the capital of Germany.",
    ];

    fn vocabulary() -> Vec<&'static str> {
        vec!["paris", "lyon", "berlin", "capital", "france", "germany", "city"]
    }

    async fn city_store(embedder: &KeywordEmbedder) -> LocalVectorStore {
        let chunks: Vec<Chunk> = CITIES
            .iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                chunk_id: format!("city-{index}"),
                source: "cities.pdf".to_string(),
                page: 1,
                index: index as u64,
                text: text.to_string(),
            })
            .collect();
        let texts: Vec<String> = CITIES.iter().map(|text| text.to_string()).collect();
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        LocalVectorStore::from_parts("cities", "keyword", chunks, vectors, Vec::new()).unwrap()
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            model: "open-mistral-7b".to_string(),
            temperature: 0.0,
            max_tokens: 128,
            random_seed: 0,
        }
    }

    #[tokio::test]
    async fn capital_question_ranks_paris_first() {
        let embedder = Arc::new(KeywordEmbedder::new(&vocabulary()));
        let store = Arc::new(city_store(&embedder).await);
        let generator = Arc::new(RecordingGenerator::default());
        let template =
            PromptTemplate::parse("Context:\n{context}\n\nQuestion: {question}\nAnswer:").unwrap();
        let pipeline = RagPipeline::new(
            embedder.clone(),
            store.clone(),
            template,
            generator.clone(),
            2,
            options(),
        );

        let question = "What is the capital of France?";
        let hits = store
            .similarity_search(&embedder.embed(question).await.unwrap(), 2)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, CITIES[0]);

        let answer = pipeline.invoke(question).await.unwrap();
        assert_eq!(answer, "generated answer");

        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        let prompt = &prompts[0];
        assert!(prompt.contains(question));
        assert!(prompt.contains(&hits[0].chunk.text));
        assert!(prompt.contains(&hits[1].chunk.text));
        let paris = prompt.find(CITIES[0]).unwrap();
        let second = prompt.find(hits[1].chunk.text.as_str()).unwrap();
        assert!(paris < second);
        assert!(prompt.contains(&format!("{}\n\n{}", hits[0].chunk.text, hits[1].chunk.text)));
    }

    #[tokio::test]
    async fn generation_options_are_forwarded() {
        let embedder = Arc::new(KeywordEmbedder::new(&vocabulary()));
        let store = Arc::new(city_store(&embedder).await);
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = RagPipeline::new(
            embedder,
            store,
            PromptTemplate::parse("{context}|{question}").unwrap(),
            generator.clone(),
            1,
            options(),
        );

        pipeline.invoke("Where is Lyon?").await.unwrap();
        pipeline.invoke("Where is Lyon?").await.unwrap();

        let seen = generator.options.lock().unwrap().clone();
        assert_eq!(seen, vec![options(), options()]);
        let prompts = generator.prompts();
        assert_eq!(prompts[0], prompts[1]);
        assert_eq!(prompts[0], format!("{}|Where is Lyon?", CITIES[1]));
    }

    #[tokio::test]
    async fn generator_failure_propagates() {
        let embedder = Arc::new(KeywordEmbedder::new(&vocabulary()));
        let store = Arc::new(city_store(&embedder).await);
        let pipeline = RagPipeline::new(
            embedder,
            store,
            PromptTemplate::parse("{context} {question}").unwrap(),
            Arc::new(FailingGenerator),
            2,
            options(),
        );

        let error = pipeline.answer("anything").await.unwrap_err();
        assert!(matches!(error, RagError::Provider(_)));
    }
}
