//! Recipe selection and preview

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use super::{ApiError, ApiState};
use crate::recipes::Recipe;

/// Build recipe browsing router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(select))
        .route("/recipes/{id}", get(preview))
        .with_state(state)
}

/// Card on the selection screen
#[derive(Debug, Serialize)]
pub struct RecipeCard {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: String,
    pub step_count: usize,
}

impl From<&Recipe> for RecipeCard {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            title: recipe.title.clone(),
            description: recipe.description.clone(),
            image: recipe.image.clone(),
            step_count: recipe.steps.len(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelectionView {
    pub recipes: Vec<RecipeCard>,
}

/// One numbered line of the preview
#[derive(Debug, Serialize)]
pub struct PreviewStep {
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct PreviewView {
    pub id: String,
    pub title: String,
    pub image: String,
    /// `"{n} steps • {description}"`
    pub meta: String,
    pub steps: Vec<PreviewStep>,
    /// Route that starts cooking
    pub start: String,
}

/// Meta line under the preview title
#[must_use]
pub fn meta_line(recipe: &Recipe) -> String {
    format!("{} steps • {}", recipe.steps.len(), recipe.description)
}

/// Selection screen; leaving a cook run lands here and ends it
async fn select(State(state): State<Arc<ApiState>>) -> Json<SelectionView> {
    state.close_session().await;

    Json(SelectionView {
        recipes: state
            .catalog
            .iter()
            .map(|recipe| RecipeCard::from(recipe.as_ref()))
            .collect(),
    })
}

async fn preview(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<PreviewView>, ApiError> {
    let recipe = state
        .catalog
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("recipe '{id}' not found")))?;

    Ok(Json(PreviewView {
        id: recipe.id.clone(),
        title: recipe.title.clone(),
        image: recipe.image.clone(),
        meta: meta_line(&recipe),
        steps: recipe
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| PreviewStep {
                number: i + 1,
                text: step.text.clone(),
            })
            .collect(),
        start: format!("/cook/{}", recipe.id),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipes::Step;

    #[test]
    fn meta_line_counts_steps() {
        let recipe = Recipe {
            id: "r".to_string(),
            title: "R".to_string(),
            description: "Quick and fresh".to_string(),
            image: String::new(),
            steps: vec![
                Step {
                    id: 1,
                    text: "One.".to_string(),
                    prompt: None,
                },
                Step {
                    id: 2,
                    text: "Two.".to_string(),
                    prompt: None,
                },
            ],
        };
        assert_eq!(meta_line(&recipe), "2 steps • Quick and fresh");
        assert_eq!(RecipeCard::from(&recipe).step_count, 2);
    }
}
