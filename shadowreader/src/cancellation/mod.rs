//! Cooperative cancellation of page turns.
//!
//! Each opened book owns a `CancellationToken`; releasing the book fires it
//! and any read or fetch still awaiting completes with `Cancelled`.

mod token;

pub use token::CancellationToken;
