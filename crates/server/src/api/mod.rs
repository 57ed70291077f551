pub mod browse;
pub mod lists;
pub mod media;
pub mod params;
pub mod subsonic;
pub mod system;

use axum::handler::Handler;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

/// Registers `handler` as `/rest/<method>` and `/rest/<method>.view`, for
/// both GET and POST.
fn rest<H, T>(router: Router<AppState>, method: &str, handler: H) -> Router<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    router
        .route(
            &format!("/rest/{}", method),
            get(handler.clone()).post(handler.clone()),
        )
        .route(
            &format!("/rest/{}.view", method),
            get(handler.clone()).post(handler),
        )
}

pub fn api_router(state: AppState) -> Router {
    let mut router = Router::new();
    router = rest(router, "ping", system::ping);
    router = rest(router, "getLicense", system::get_license);
    router = rest(router, "getMusicFolders", system::get_music_folders);
    router = rest(router, "startScan", system::start_scan);
    router = rest(router, "getScanStatus", system::get_scan_status);
    router = rest(router, "getIndexes", browse::get_indexes);
    router = rest(router, "getMusicDirectory", browse::get_music_directory);
    router = rest(router, "getGenres", browse::get_genres);
    router = rest(router, "getArtists", browse::get_artists);
    router = rest(router, "getArtist", browse::get_artist);
    router = rest(router, "getAlbum", browse::get_album);
    router = rest(router, "getSong", browse::get_song);
    router = rest(router, "search2", lists::search2);
    router = rest(router, "search3", lists::search3);
    router = rest(router, "getAlbumList", lists::get_album_list);
    router = rest(router, "getAlbumList2", lists::get_album_list2);
    router = rest(router, "getRandomSongs", lists::get_random_songs);
    router = rest(router, "getSongsByGenre", lists::get_songs_by_genre);
    router = rest(router, "stream", media::stream);
    router = rest(router, "download", media::download);
    router = rest(router, "getCoverArt", media::get_cover_art);

    router
        .route("/musicFolderSettings.view", get(system::music_folder_settings))
        .with_state(state)
}
