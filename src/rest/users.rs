use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{AppState, CurrentUser, Empty, RestResponse, RestResult};
use crate::models::Role;
use crate::users::store_recent_search;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub role: Role,
    pub recent_searched_cities: Vec<String>,
}

pub async fn profile_handler(Extension(CurrentUser(user)): Extension<CurrentUser>) -> RestResult<Profile> {
    Ok(RestResponse::ok(Profile {
        role: user.role,
        recent_searched_cities: user.recent_searched_cities,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSearch {
    #[serde(default)]
    pub recent_searched_city: String,
}

pub async fn recent_search_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(mut user)): Extension<CurrentUser>,
    payload: Result<Json<RecentSearch>, JsonRejection>,
) -> RestResult<Empty> {
    let request = state.body(payload)?;
    let storage = state.storage().await?;
    store_recent_search(storage, &mut user, &request.recent_searched_city).map_err(|e| state.reject(e))?;
    Ok(RestResponse::message("New City added"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use serde_json::json;

    #[tokio::test]
    async fn profile_tracks_last_three_cities() {
        let state = state();
        let (_, body) = send(&state, get_request("/api/user", Some("ada"))).await;
        assert_eq!(body, json!({"success": true, "role": "user", "recentSearchedCities": []}));

        for city in ["Paris", "Rome", "Oslo", "Lima"] {
            let (_, body) = send(
                &state,
                json_request("POST", "/api/user/store-recent-search", Some("ada"), json!({"recentSearchedCity": city})),
            )
            .await;
            assert_eq!(body["message"], "New City added");
        }

        let (_, body) = send(&state, get_request("/api/user", Some("ada"))).await;
        assert_eq!(body["recentSearchedCities"], json!(["Rome", "Oslo", "Lima"]));

        let (_, body) = send(
            &state,
            json_request("POST", "/api/user/store-recent-search", Some("ada"), json!({})),
        )
        .await;
        assert_eq!(body, json!({"success": false, "message": "City is required"}));
    }
}
