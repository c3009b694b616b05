//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use waggle_core::DogProfile;

use crate::filters;
use crate::middleware::DocumentCaller;
use crate::routes::Chrome;
use crate::state::AppState;

// =============================================================================
// Static content
// =============================================================================

/// Words cycled through after the hero headline.
pub const HERO_WORDS: [&str; 3] = ["Verified Owners", "Safe Matches", "Happy Pups"];

/// Title shown when a testimonial has none.
pub const DEFAULT_TESTIMONIAL_TITLE: &str = "Dog Owner";

/// A quote from a happy owner.
#[derive(Clone)]
pub struct Testimonial {
    pub quote: &'static str,
    pub name: &'static str,
    pub title: &'static str,
}

impl Testimonial {
    const fn new(quote: &'static str, name: &'static str, title: Option<&'static str>) -> Self {
        Self {
            quote,
            name,
            title: match title {
                Some(title) => title,
                None => DEFAULT_TESTIMONIAL_TITLE,
            },
        }
    }
}

/// Testimonials rendered in the "Happy Matches" section.
pub const TESTIMONIALS: [Testimonial; 5] = [
    Testimonial::new(
        "I found the perfect match for my Bella! The Waggle community is so friendly and supportive. The whole process was safe and easy.",
        "Samantha T.",
        Some("Proud Dog Owner"),
    ),
    Testimonial::new(
        "Our Labrador, Max, is happier than ever after meeting his new playmate on Waggle. It was a joy watching their bond grow.",
        "Daniel R.",
        Some("Labrador Parent"),
    ),
    Testimonial::new(
        "Waggle\u{2019}s profiles and messaging helped me connect with responsible owners nearby. Luna and Charlie had the best time together!",
        "Priya & Luna",
        Some("Dog Family"),
    ),
    Testimonial::new(
        "We love the emphasis on safe matching and verified profiles. We felt so confident finding a mate for our Golden Retriever.",
        "Joanne B.",
        Some("Happy Customer"),
    ),
    Testimonial::new(
        "Waggle makes dog dating safe, fun, and easy. We've made new friends (for both us and our pup)!",
        "Leigh W.",
        Some("Dog Matchmaker"),
    ),
];

// =============================================================================
// Template
// =============================================================================

#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub hero_words: [&'static str; 3],
    pub featured: Vec<DogProfile>,
    pub testimonials: [Testimonial; 5],
}

/// Display the home page.
///
/// A document store failure is logged and the featured section renders empty.
#[instrument(skip(state, caller, chrome))]
pub async fn home(
    State(state): State<AppState>,
    DocumentCaller(caller): DocumentCaller,
    chrome: Chrome,
) -> impl IntoResponse {
    let featured = state.dogs_for(caller).list_featured().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to fetch featured dogs");
        Vec::new()
    });

    HomeTemplate {
        chrome,
        hero_words: HERO_WORDS,
        featured,
        testimonials: TESTIMONIALS,
    }
}
