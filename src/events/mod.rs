//! # Events Module
//!
//! Progress reporting for the scan and export phases.
//!
//! Two complementary interfaces are offered:
//! - [`Progress`], a shared done/total counter that can be polled
//! - an event channel carrying serde-serializable [`Event`]s
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Scan(ScanEvent::Progress(p)) = event {
//!             println!("scored {}/{}", p.done, p.total);
//!         }
//!     }
//! });
//!
//! let report = ScanOrchestrator::new(config).run_with_events(&root, &sender)?;
//! ```

mod channel;
mod progress;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use progress::Progress;
pub use types::*;
