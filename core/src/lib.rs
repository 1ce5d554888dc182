//! Blocking client for the Roadie same-day delivery API.
//!
//! # Overview
//! `Client` holds the connection configuration and exposes the
//! `estimates()` and `shipments()` sub-services. Each operation builds an
//! `HttpRequest`, sends it through a `Transport` under a caller-supplied
//! `Context`, and decodes either the typed response or the API's
//! `ErrorResponse`.
//!
//! ```no_run
//! use roadie::{Client, Context};
//! # fn run(request: roadie::CreateEstimateRequest) -> roadie::Result<()> {
//! let client = Client::builder()
//!     .with_env_vars()
//!     .with_access_token("my-token")
//!     .build()?;
//! let estimate = client.estimates().create(&Context::background(), &request)?;
//! println!("{} ({} miles)", estimate.price, estimate.estimated_distance);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Configuration is applied once through `ClientBuilder`; only the access
//!   token can change afterwards, via `Client::update_access_token`.
//! - No retries, caching or validation: every failure is returned to the
//!   caller as an `Error`.
//! - The default transport is a blocking `ureq` agent with a one-minute
//!   timeout; tests and callers can plug in any `Transport`. It polls the
//!   `Context` while waiting, so cancelling or an expired deadline returns
//!   promptly even when the server never answers.
//! - Wire field names are the API's `snake_case` (`pickup_location`,
//!   `deliver_between`). Earlier Go clients serialized untagged structs and
//!   sent `PascalCase` names, which the API does not read.

pub mod client;
pub mod context;
pub mod error;
pub mod estimates;
pub mod http;
pub mod shipments;
pub mod transport;
pub mod types;

pub use client::{
    Client, ClientBuilder, DEFAULT_HOST, DEFAULT_HOST_ENV, DEFAULT_VERSION, DEFAULT_VERSION_ENV,
};
pub use context::Context;
pub use error::{Error, Result};
pub use estimates::EstimatesService;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use shipments::ShipmentsService;
pub use transport::{BearerTransport, Transport, UreqTransport, DEFAULT_TIMEOUT};
pub use types::{
    Address, CancelShipmentRequest, CancellationCode, Contact, CreateEstimateRequest,
    CreateEstimateResponse, CreateShipmentRequest, DeliveryOptions, Driver, ErrorDetail,
    ErrorResponse, Item, Location, Shipment, ShipmentEvent, ShipmentState, TimeWindow,
    UpdateShipmentRequest,
};
