//! Client side of the portal AI relay, used by front ends and tooling.

pub mod client;
pub mod in_flight;

pub use client::{
    LeaveLookupFailure, RelayClient, RelayClientError, ANALYZE_IMAGE_PATH, ANALYZE_ISSUE_PATH,
    CHAT_PATH, LEAVE_BALANCE_PATH,
};
pub use in_flight::{InFlight, InFlightTicket};
