//! Price estimates for prospective shipments.

use crate::client::Client;
use crate::context::Context;
use crate::error::Result;
use crate::http::HttpMethod;
use crate::types::{CreateEstimateRequest, CreateEstimateResponse};

/// Operations on the `estimates` resource.
#[derive(Debug, Clone, Copy)]
pub struct EstimatesService<'a> {
    client: &'a Client,
}

impl<'a> EstimatesService<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Requests a price, size and distance estimate.
    pub fn create(
        &self,
        ctx: &Context,
        estimate: &CreateEstimateRequest,
    ) -> Result<CreateEstimateResponse> {
        let req = self
            .client
            .create_request(HttpMethod::Post, "estimates", Some(estimate))?;
        self.client.execute(ctx, &req)
    }
}
