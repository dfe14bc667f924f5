use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::bb8::Pool;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Pool<AsyncPgConnection>,
}
