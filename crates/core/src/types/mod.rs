//! Core types for Waggle.
//!
//! This module provides type-safe wrappers for the domain concepts.

pub mod dog;
pub mod email;
pub mod id;
pub mod identity;
pub mod theme;

pub use dog::{BirthDate, DogGender, DogProfile, NewDogProfile, ParseGenderError};
pub use email::{Email, EmailError};
pub use id::*;
pub use identity::{Identity, IdentityPatch};
pub use theme::Theme;
