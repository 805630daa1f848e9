//! Identity and result types shared by causes and fibers.
//!
//! - [`fiber_id`]: runtime and composite fiber identities
//! - [`exit`]: the terminal success-or-cause result of a fiber

pub mod exit;
pub mod fiber_id;

pub use exit::Exit;
pub use fiber_id::{FiberId, RuntimeFiberId};
