//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `init`: Prometheus exporter with an HTTP scrape endpoint

pub mod events;

use metrics_exporter_prometheus::PrometheusBuilder;
use snafu::prelude::*;
use std::net::SocketAddr;
use tracing::info;

use crate::error::{AddressParseSnafu, MetricsError, PrometheusInitSnafu};

/// Emit an internal event.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding metric.
///
/// ```ignore
/// use floodgate_core::emit;
/// use floodgate_core::metrics::events::BlobBytesWritten;
///
/// emit!(BlobBytesWritten { bytes: 1024, blob: "orders.csv".to_string() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

/// Install the Prometheus recorder and serve `/metrics` on `address`.
///
/// Must be called from within a tokio runtime.
pub fn init(address: &str) -> Result<(), MetricsError> {
    let addr: SocketAddr = address.parse().context(AddressParseSnafu { address })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context(PrometheusInitSnafu)?;

    info!(%addr, "Metrics endpoint listening");
    Ok(())
}
