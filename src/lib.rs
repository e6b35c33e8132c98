//! # antidote
//!
//! Async client for [AntidoteDB](https://www.antidotedb.eu/), a geo-replicated
//! CRDT database, over its protocol-buffer interface.
//!
//! ```no_run
//! use antidote::prelude::*;
//!
//! # async fn example() -> Result<(), antidote::ClientError> {
//! let client = antidote::connect("localhost", 8087);
//!
//! let counter = client.counter("page-views");
//! client.update([counter.increment(1)]).await?;
//! let views = client.read(&counter).await?;
//!
//! let tx = client.start_transaction().await?;
//! let tags = tx.set::<String>("tags");
//! tx.update([tags.add(&"rust".to_string())?]).await?;
//! tx.commit().await?;
//! # let _ = views;
//! # Ok(())
//! # }
//! ```

pub use antidote_client::*;

/// Wire protocol types.
pub mod protocol {
    pub use antidote_protocol::*;
}

/// Traits needed to create handles and read through a session.
pub mod prelude {
    pub use antidote_client::{CrdtFactory, CrdtObject, Session};
}
