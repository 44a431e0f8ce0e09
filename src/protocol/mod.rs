/// Protocol types for correlated calls
///
/// This module defines the request payload carried on send channels and
/// the positional argument convention shared by callers and answerers.
mod args;
mod message;

pub use args::Args;
pub use message::CallEnvelope;
