//! DVB tuner control: channel state, LNB/DiSEqC, and the frontend
//! state machine.
//!
//! Hardware access goes through the [`device::TunerDevice`] and
//! [`device::DvrReader`] traits; [`sim`] provides a software backend
//! for tests and demos. [`frontend::Frontend`] drives a device through
//! tune, lock polling, and PID filter maintenance with bounded retry
//! budgets.

pub mod channel;
pub mod delivery;
pub mod device;
pub mod frontend;
pub mod lnb;
pub mod sim;

pub use channel::ChannelData;
pub use delivery::DeliverySystem;
pub use device::{DvrReader, TunerDevice};
pub use frontend::Frontend;
pub use lnb::Lnb;
