use std::sync::Arc;

use crate::{
    auth::tokens::TokenService, config::AppConfig, files::FileStore, imagegen::ImageGenerator,
    store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub files: Arc<dyn FileStore>,
    pub images: Arc<dyn ImageGenerator>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        files: Arc<dyn FileStore>,
        images: Arc<dyn ImageGenerator>,
        tokens: TokenService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            files,
            images,
            tokens,
        }
    }
}
