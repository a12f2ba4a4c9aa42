//! Rate-limited, retrying dispatch
//!
//! A dispatch moves through `Pending -> Admitted -> Invoked`, then ends in
//! success, a terminal failure, or loops back to `Pending` after a retry
//! delay. [`Dispatcher`] runs that loop on tokio and [`BlockingDispatcher`]
//! on the calling thread; both fold outcomes through the same step
//! function so their retry accounting is identical.

mod blocking;
mod dispatcher;
mod state;

pub use blocking::BlockingDispatcher;
pub use dispatcher::Dispatcher;
pub use state::DispatchError;
