//! # System Wiring
//!
//! The [`Backoffice`] owns everything a request needs: the domain registry, one table per
//! model and the per-domain serializers built over those tables. Commands are created by the
//! factories of the [`backoffice`](crate::backoffice) and [`partner`](crate::partner)
//! namespaces and wrapped into an [`Operation`](domain_framework::Operation) here, together
//! with the calling domain and the params of the request.
//!
//! ```rust,ignore
//! let system = Backoffice::new()?;
//! let mut operation = system.operation(
//!     backoffice::find_user(&system),
//!     Some("main"),
//!     Params::new().with("id", 1),
//! );
//! let result = operation.perform();
//! ```
//!
//! Wiring happens in two steps. Tables are created first, without dependencies; the
//! serializers are built afterwards and capture clones of the tables they resolve
//! references through. A table handle is cheap to clone and every clone sees the same rows.
//!
//! ## Observability
//!
//! Call [`setup_tracing`](domain_framework::tracing::setup_tracing) once at startup. Each
//! `perform()` runs in a `perform` span carrying the operation and the calling domain;
//! table writes log the model and id.
//!
//! ```bash
//! RUST_LOG=info cargo run      # Compact logs
//! RUST_LOG=debug cargo run     # Full payloads
//! ```

mod system;

pub use system::*;
