use crate::state::AppState;
use magiclist_dal::song::{CreateSong, SongRepository, UpdateSong};

crate::crud_api!(Song);

pub fn router() -> axum::Router<AppState> {
    crate::crud_router!()
}
