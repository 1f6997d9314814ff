use crate::state::AppState;
use magiclist_dal::member::{CreateMember, MemberRepository, UpdateMember};

crate::crud_api!(Member);

pub fn router() -> axum::Router<AppState> {
    crate::crud_router!()
}
