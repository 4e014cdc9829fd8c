//! HTTP API handlers for tga-api

pub mod attachments;
pub mod callback;
pub mod genres;
pub mod health;
pub mod requests;
pub mod users;

pub use attachments::attachment_routes;
pub use callback::callback_routes;
pub use genres::genre_routes;
pub use health::health_routes;
pub use requests::request_routes;
pub use users::user_routes;

use crate::auth::CurrentUser;
use crate::services::Actor;

fn actor(user: &CurrentUser) -> Actor {
    Actor {
        user_id: user.id,
        is_moderator: user.is_moderator(),
    }
}
