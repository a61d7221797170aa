use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::services::characters::CharacterStore;
use crate::services::comics::ComicFactory;
use crate::services::llm::TextModel;
use crate::services::magic::ImageMagic;
use crate::services::rag::RagIndex;
use crate::services::renderer::{Captioner, ImageModel};
use crate::services::stories::StoryStore;
use crate::session::Session;

/// Shared application state available to all handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub llm_client: Arc<dyn TextModel>,
    pub image_client: Arc<dyn ImageModel>,
    pub captioner: Arc<Captioner>,
    pub characters: Arc<CharacterStore>,
    pub stories: Arc<StoryStore>,
    pub comics: Arc<ComicFactory>,
    pub magic: Arc<ImageMagic>,
    pub session: Arc<Mutex<Session>>,
    rag_index: Arc<RwLock<Option<Arc<RagIndex>>>>,
    /// Bumped on every invalidation; a build only caches its result if no
    /// change happened while it was embedding.
    index_generation: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(
        config: Config,
        llm_client: Arc<dyn TextModel>,
        image_client: Arc<dyn ImageModel>,
        captioner: Captioner,
    ) -> Self {
        let characters = CharacterStore::new(config.characters_file(), config.character_images_dir());
        let stories = StoryStore::new(config.stories_file());
        let comics = ComicFactory::new(config.comics_dir(), config.panel_width, config.panel_height);
        let magic = ImageMagic::new(config.magic_dir(), config.panel_width, config.panel_height);

        Self {
            config: Arc::new(config),
            llm_client,
            image_client,
            captioner: Arc::new(captioner),
            characters: Arc::new(characters),
            stories: Arc::new(stories),
            comics: Arc::new(comics),
            magic: Arc::new(magic),
            session: Arc::new(Mutex::new(Session::default())),
            rag_index: Arc::new(RwLock::new(None)),
            index_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The retrieval index, built from the stores on first use after any change.
    pub async fn rag_index(&self) -> Result<Arc<RagIndex>> {
        if let Some(index) = self.rag_index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let generation = self.index_generation.load(Ordering::SeqCst);
        let characters = self.characters.list().await?;
        let stories = self.stories.list().await?;
        let index = Arc::new(RagIndex::build(self.llm_client.as_ref(), &characters, &stories).await?);

        let mut slot = self.rag_index.write().await;
        if self.index_generation.load(Ordering::SeqCst) == generation {
            *slot = Some(Arc::clone(&index));
        } else {
            tracing::debug!("Collections changed during the index build; not caching it");
        }
        Ok(index)
    }

    /// Drop the cached index after characters or stories change.
    pub async fn invalidate_index(&self) {
        let mut slot = self.rag_index.write().await;
        self.index_generation.fetch_add(1, Ordering::SeqCst);
        if slot.take().is_some() {
            tracing::debug!("Retrieval index invalidated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCharacter, UploadedImage};
    use crate::services::testing::{FakeImageModel, bag_of_words, png_bytes};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;
    use tokio::sync::Notify;

    /// Holds the first `embed` call until `release` is notified.
    struct GatedTextModel {
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedTextModel {
        fn new() -> Self {
            Self {
                gated: AtomicBool::new(true),
                entered: Notify::new(),
                release: Notify::new(),
            }
        }
    }

    #[async_trait]
    impl TextModel for GatedTextModel {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("answer".to_string())
        }

        async fn generate_with_image(&self, _prompt: &str, _image: &[u8], _mime: &str) -> Result<String> {
            Ok("description".to_string())
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.gated.swap(false, Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(bag_of_words(text))
        }
    }

    fn new_character(name: &str) -> NewCharacter {
        NewCharacter {
            name: name.to_string(),
            role: "Student".to_string(),
            age: None,
            visual_description: "school uniform".to_string(),
            personality: None,
            tags: Vec::new(),
        }
    }

    fn upload() -> Vec<UploadedImage> {
        vec![UploadedImage {
            file_name: Some("ref.png".to_string()),
            bytes: png_bytes(4, 4, 10),
        }]
    }

    #[tokio::test]
    async fn index_built_across_a_change_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(GatedTextModel::new());
        let state = AppState::new(
            Config::with_data_dir(dir.path()),
            model.clone(),
            Arc::new(FakeImageModel::new()),
            Captioner::new(None),
        );
        state
            .characters
            .add_from_images(new_character("Kabir"), upload())
            .await
            .unwrap();

        let building = tokio::spawn({
            let state = state.clone();
            async move { state.rag_index().await }
        });
        model.entered.notified().await;

        state
            .characters
            .add_from_images(new_character("Priya"), upload())
            .await
            .unwrap();
        state.invalidate_index().await;
        model.release.notify_one();

        let stale = building.await.unwrap().unwrap();
        assert_eq!(stale.len(), 1);
        assert!(state.rag_index.read().await.is_none());

        let fresh = state.rag_index().await.unwrap();
        assert_eq!(fresh.len(), 2);
    }

    #[tokio::test]
    async fn index_is_cached_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(GatedTextModel::new());
        model.gated.store(false, Ordering::SeqCst);
        let state = AppState::new(
            Config::with_data_dir(dir.path()),
            model,
            Arc::new(FakeImageModel::new()),
            Captioner::new(None),
        );

        let first = state.rag_index().await.unwrap();
        let second = state.rag_index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        state.invalidate_index().await;
        let third = state.rag_index().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
