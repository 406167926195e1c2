/**
 * Routes Module
 * API route handlers
 */
pub mod categories;
pub mod crud;
pub mod health;
pub mod locations;
pub mod menu;
pub mod place_images;
pub mod places;
pub mod social_media;
pub mod tags;
pub mod uploads;

use serde::{Deserialize, Serialize};

/// Success body: a human-readable `detail` and the payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub detail: String,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(detail: impl Into<String>, data: T) -> Self {
        Self {
            detail: detail.into(),
            data,
        }
    }
}
