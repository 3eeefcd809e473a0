//! Vehicle catalog.

use reqwest::Method;
use shared::models::{Car, CarUpdate, NewCar, Page};
use tracing::{debug, info};
use url::form_urlencoded;

use crate::{
    authorizer::RequestAuthorizer,
    error::{ClientError, ClientResult},
};

/// Authorized calls against the car catalog.
#[derive(Debug, Clone)]
pub struct CarsApi {
    authorizer: RequestAuthorizer,
}

impl CarsApi {
    /// Wraps `authorizer`.
    #[must_use]
    pub fn new(authorizer: RequestAuthorizer) -> Self {
        Self { authorizer }
    }

    /// One page of the catalog.
    ///
    /// # Errors
    /// Any [`ClientError`] from the authorized call.
    pub async fn list(&self, page: Page) -> ClientResult<Vec<Car>> {
        let request = self.authorizer.authorize(Method::GET, "/cars/").query(&page);
        self.authorizer.fetch_json(request).await
    }

    /// Cars whose make, model or description mention `query`.
    ///
    /// # Errors
    /// [`ClientError::InvalidInput`] for a blank query, else any
    /// [`ClientError`] from the authorized call.
    pub async fn search(&self, query: &str, page: Page) -> ClientResult<Vec<Car>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ClientError::InvalidInput("search query is empty".to_string()));
        }
        let path = format!("/cars/search/{}", encode_segment(query));
        let request = self.authorizer.authorize(Method::GET, &path).query(&page);
        let found: Vec<Car> = self.authorizer.fetch_json(request).await?;
        debug!(matches = found.len(), "catalog search finished");
        Ok(found)
    }

    /// # Errors
    /// Any [`ClientError`] from the authorized call; 404 arrives as `Rejected`.
    pub async fn get(&self, id: i64) -> ClientResult<Car> {
        self.authorizer.get_json(&format!("/cars/{id}")).await
    }

    /// # Errors
    /// [`ClientError::InvalidInput`] for a blank make or model, else any
    /// [`ClientError`] from the authorized call.
    pub async fn create(&self, car: &NewCar) -> ClientResult<Car> {
        if car.make.trim().is_empty() || car.model.trim().is_empty() {
            return Err(ClientError::InvalidInput(
                "make and model are required".to_string(),
            ));
        }
        let created: Car = self
            .authorizer
            .send_json(Method::POST, "/cars/", car)
            .await?;
        info!(car_id = created.id, "car created");
        Ok(created)
    }

    /// # Errors
    /// [`ClientError::InvalidInput`] when `changes` is empty, else any
    /// [`ClientError`] from the authorized call.
    pub async fn update(&self, id: i64, changes: &CarUpdate) -> ClientResult<Car> {
        if changes.is_empty() {
            return Err(ClientError::InvalidInput("nothing to update".to_string()));
        }
        let updated: Car = self
            .authorizer
            .send_json(Method::PUT, &format!("/cars/{id}"), changes)
            .await?;
        info!(car_id = id, "car updated");
        Ok(updated)
    }

    /// # Errors
    /// Any [`ClientError`] from the authorized call.
    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        self.authorizer.delete(&format!("/cars/{id}")).await?;
        info!(car_id = id, "car deleted");
        Ok(())
    }
}

/// Percent-encodes `raw` for use as one path segment.
fn encode_segment(raw: &str) -> String {
    // Form encoding writes spaces as '+', which a path would keep literally.
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
