//! Wire models shared by the gateway, the server and the client.
//!
//! - `envelope`: the `{ success, data, error }` response contract.
//! - `forms`: request bodies of the write routes and the fan-out aggregate.

// Author: kelexine (https://github.com/kelexine)

pub mod envelope;
pub mod forms;

pub use envelope::{ErrorBody, ResponseEnvelope};
pub use forms::{ChatRequest, ContactForm, CreateOrderRequest, VerifyPaymentRequest, WebsiteData};
