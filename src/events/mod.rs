//! # Events Module
//!
//! Progress and outcome reporting for vault operations.
//!
//! ## Design
//! The engine emits events through a channel, so any front end (CLI, a
//! browser-extension bridge, a log shipper) can subscribe without the
//! engine knowing about it. Emitting never fails an operation.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Ingest(IngestEvent::HostFailed { host, error, .. }) => {
//!                 eprintln!("{} upload failed: {}", host, error)
//!             }
//!             Event::Lifecycle(LifecycleEvent::Purged { trash_id }) => println!("purged {}", trash_id),
//!             _ => {}
//!         }
//!     }
//! });
//!
//! let vault = VaultBuilder::new(index, pixvid).events(sender).build();
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
