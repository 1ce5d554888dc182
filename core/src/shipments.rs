//! Shipment creation, tracking and cancellation.

use crate::client::Client;
use crate::context::Context;
use crate::error::Result;
use crate::http::HttpMethod;
use crate::types::{CancelShipmentRequest, CreateShipmentRequest, Shipment, UpdateShipmentRequest};

/// Operations on the `shipments` resource.
#[derive(Debug, Clone, Copy)]
pub struct ShipmentsService<'a> {
    client: &'a Client,
}

impl<'a> ShipmentsService<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn create(&self, ctx: &Context, shipment: &CreateShipmentRequest) -> Result<Shipment> {
        let req = self
            .client
            .create_request(HttpMethod::Post, "shipments", Some(shipment))?;
        self.client.execute(ctx, &req)
    }

    pub fn get(&self, ctx: &Context, id: u64) -> Result<Shipment> {
        let req = self
            .client
            .create_request(HttpMethod::Get, &format!("shipments/{id}"), None::<&()>)?;
        self.client.execute(ctx, &req)
    }

    /// Fetches several shipments in one call. Unknown ids are absent from
    /// the result. No request is made for an empty slice.
    pub fn list(&self, ctx: &Context, ids: &[u64]) -> Result<Vec<Shipment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let req = self
            .client
            .create_request(HttpMethod::Get, &format!("shipments?ids={ids}"), None::<&()>)?;
        self.client.execute(ctx, &req)
    }

    /// Applies a partial update; only the fields set in `update` change.
    pub fn update(
        &self,
        ctx: &Context,
        id: u64,
        update: &UpdateShipmentRequest,
    ) -> Result<Shipment> {
        let req = self
            .client
            .create_request(HttpMethod::Patch, &format!("shipments/{id}"), Some(update))?;
        self.client.execute(ctx, &req)
    }

    pub fn cancel(&self, ctx: &Context, id: u64, cancellation: &CancelShipmentRequest) -> Result<()> {
        let req = self.client.create_request(
            HttpMethod::Delete,
            &format!("shipments/{id}"),
            Some(cancellation),
        )?;
        self.client.execute_empty(ctx, &req)
    }
}
