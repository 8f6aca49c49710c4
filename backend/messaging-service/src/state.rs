use crate::services::MessagingFacade;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<MessagingFacade>,
}
