//! Blackhole Proxy - static-route HTTP front door
//!
//! Forwards a fixed set of POST routes to backend services addressed as
//! `<service>.<namespace>`:
//! - `POST /recommends` -> `recommendation.<namespace>`
//! - `POST /prodcat` -> `productcatalog.<namespace>`
//! - `POST /shipment` -> `shipping.<namespace>`
//! - `GET /` answers with a fixed greeting; everything else is a 404

pub mod config;
pub mod error;
pub mod proxy;
pub mod routes;

pub use config::{DEFAULT_NAMESPACE, DEFAULT_PORT, GatewayConfig};
pub use error::ForwardError;
pub use proxy::{GREETING, ProxyServer};
pub use routes::{Route, RouteAction, RouteTable};
