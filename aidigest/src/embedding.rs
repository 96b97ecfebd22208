//! FastEmbed-backed embedding client, grounded on
//! `recommendation::engine::generate_embeddings`'s `LazyLock<Arc<Mutex<TextEmbedding>>>`
//! + `spawn_blocking` pattern. Implements [`relevance::EmbeddingClient`] so
//! S2's semantic score and S4/S5's embedding needs share one backend.

use std::sync::{Arc, LazyLock, Mutex};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::relevance::EmbeddingClient;

static MODEL: LazyLock<Arc<Mutex<TextEmbedding>>> =
    LazyLock::new(|| init_model().expect("failed to initialize fastembed model"));

fn init_model() -> Result<Arc<Mutex<TextEmbedding>>, eyre::Error> {
    tracing::info!("initializing FastEmbed model (may download weights on first run)");
    let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML12V2))
        .map_err(|err| eyre::eyre!(err))?;
    Ok(Arc::new(Mutex::new(model)))
}

/// The shared embedding backend, usable anywhere a [`EmbeddingClient`] is
/// expected.
pub struct FastEmbedClient;

#[async_trait::async_trait]
impl EmbeddingClient for FastEmbedClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, eyre::Error> {
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut model = MODEL.lock().map_err(|_| eyre::eyre!("embedding model lock poisoned"))?;
            let embeddings = model.embed(texts, None).map_err(|err| eyre::eyre!(err))?;
            Ok::<_, eyre::Error>(embeddings)
        })
        .await
        .map_err(|err| eyre::eyre!(err))?
    }
}

/// Embed one piece of text, returning a single vector.
pub async fn embed_one(client: &dyn EmbeddingClient, text: &str) -> Result<Vec<f32>, eyre::Error> {
    let mut vectors = client.embed(std::slice::from_ref(&text.to_string())).await?;
    vectors.pop().ok_or_else(|| eyre::eyre!("embedding backend returned no vectors"))
}
