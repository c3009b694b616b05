//! Dog profile route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::instrument;

use waggle_core::{BirthDate, DogGender, DogId, DogProfile, NewDogProfile};

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{DocumentCaller, RequireAuth};
use crate::routes::{Chrome, NotFoundTemplate};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// New dog form data. Optional fields arrive as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DogForm {
    pub name: String,
    pub breed: String,
    pub gender: String,
    pub birth_date: String,
    #[serde(rename = "photoURL")]
    pub photo_url: String,
    pub description: String,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl DogForm {
    /// Validate the form into a profile record without an owner.
    ///
    /// # Errors
    ///
    /// Returns the message to show next to the form.
    pub fn parse(&self) -> std::result::Result<NewDogProfile, String> {
        let name = non_empty(&self.name).ok_or("Please give your dog a name.")?;

        let gender = non_empty(&self.gender)
            .map(|g| g.parse::<DogGender>())
            .transpose()
            .map_err(|_| "Gender must be male or female.".to_string())?;

        let birth_date = non_empty(&self.birth_date)
            .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").map(BirthDate::Date))
            .transpose()
            .map_err(|_| "Birth date must look like 2024-01-04.".to_string())?;

        Ok(NewDogProfile {
            name,
            description: non_empty(&self.description),
            photo_url: non_empty(&self.photo_url),
            birth_date,
            breed: non_empty(&self.breed),
            gender,
            owner_id: None,
        })
    }
}

// =============================================================================
// Templates
// =============================================================================

/// My dogs page template.
#[derive(Template, WebTemplate)]
#[template(path = "dogs/index.html")]
pub struct DogsIndexTemplate {
    pub chrome: Chrome,
    pub dogs: Vec<DogProfile>,
}

/// New dog form template.
#[derive(Template, WebTemplate)]
#[template(path = "dogs/new.html")]
pub struct NewDogTemplate {
    pub chrome: Chrome,
    pub form: DogForm,
    pub error: Option<String>,
}

/// Dog detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "dogs/show.html")]
pub struct DogShowTemplate {
    pub chrome: Chrome,
    pub dog: DogProfile,
    /// Whether the signed-in user owns this dog.
    pub is_owner: bool,
}

// =============================================================================
// Routes
// =============================================================================

/// List the signed-in user's dogs.
#[instrument(skip(state, chrome, identity, caller), fields(uid = %identity.uid))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    DocumentCaller(caller): DocumentCaller,
    chrome: Chrome,
) -> Result<impl IntoResponse> {
    let dogs = state.dogs_for(caller).list_by_owner(&identity.uid).await?;
    Ok(DogsIndexTemplate { chrome, dogs })
}

/// Display the new dog form.
pub async fn new_dog(RequireAuth(_): RequireAuth, chrome: Chrome) -> impl IntoResponse {
    NewDogTemplate {
        chrome,
        form: DogForm::default(),
        error: None,
    }
}

/// Create a dog profile owned by the signed-in user.
#[instrument(skip(state, chrome, identity, caller, form), fields(uid = %identity.uid))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    DocumentCaller(caller): DocumentCaller,
    chrome: Chrome,
    Form(form): Form<DogForm>,
) -> Result<Response> {
    let record = match form.parse() {
        Ok(record) => record.owned_by(identity.uid.clone()),
        Err(message) => {
            let page = NewDogTemplate {
                chrome,
                form,
                error: Some(message),
            };
            return Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response());
        }
    };

    let id = state.dogs_for(caller).create(&record).await?;
    add_breadcrumb("dogs", "Created dog profile", Some(&[("dog_id", id.as_str())]));
    tracing::info!(dog_id = %id, "Dog profile created");

    Ok(Redirect::to(&format!("/dogs/{id}")).into_response())
}

/// Display one dog, or the 404 page when it does not exist.
#[instrument(skip(state, caller, chrome))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
    DocumentCaller(caller): DocumentCaller,
    chrome: Chrome,
) -> Result<Response> {
    let Some(dog) = state.dogs_for(caller).get_by_id(&DogId::new(id)).await? else {
        return Ok((StatusCode::NOT_FOUND, NotFoundTemplate { chrome }).into_response());
    };

    let is_owner = chrome
        .user
        .as_ref()
        .is_some_and(|user| dog.is_owned_by(&user.uid));

    Ok(DogShowTemplate {
        chrome,
        dog,
        is_owner,
    }
    .into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(name: &str) -> DogForm {
        DogForm {
            name: name.to_string(),
            ..DogForm::default()
        }
    }

    #[test]
    fn test_minimal_form() {
        let record = form(" Bella ").parse().unwrap();
        assert_eq!(record, NewDogProfile::named("Bella"));
    }

    #[test]
    fn test_full_form() {
        let record = DogForm {
            name: "Max".to_string(),
            breed: "Labrador".to_string(),
            gender: "male".to_string(),
            birth_date: "2024-01-04".to_string(),
            photo_url: "https://example.com/max.jpg".to_string(),
            description: "Loves fetch".to_string(),
        }
        .parse()
        .unwrap();

        assert_eq!(record.gender, Some(DogGender::Male));
        assert_eq!(
            record.birth_date.as_ref().and_then(BirthDate::date),
            NaiveDate::from_ymd_opt(2024, 1, 4)
        );
        assert_eq!(record.breed.as_deref(), Some("Labrador"));
        assert_eq!(record.photo_url.as_deref(), Some("https://example.com/max.jpg"));
        assert!(record.owner_id.is_none());
    }

    #[test]
    fn test_name_required() {
        assert!(form("   ").parse().is_err());
    }

    #[test]
    fn test_rejects_bad_gender_and_date() {
        let mut bad_gender = form("Luna");
        bad_gender.gender = "puppy".to_string();
        assert!(bad_gender.parse().is_err());

        let mut bad_date = form("Luna");
        bad_date.birth_date = "04/01/2024".to_string();
        assert!(bad_date.parse().is_err());
    }
}
