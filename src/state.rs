use crate::auth::TokenAuthenticator;
use crate::observability::metrics::Metrics;
use crate::store::Store;
use crate::tracking::rooms::RoomRegistry;

pub struct AppState {
    pub store: Store,
    pub rooms: RoomRegistry,
    pub authenticator: TokenAuthenticator,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(token_secret: &str, event_buffer_size: usize) -> Self {
        Self {
            store: Store::new(),
            rooms: RoomRegistry::new(event_buffer_size),
            authenticator: TokenAuthenticator::new(token_secret),
            metrics: Metrics::new(),
        }
    }
}
