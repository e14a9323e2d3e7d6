pub mod envelope;

pub use envelope::{
    CommandFailure, RESPONSE_ENVELOPE_SCHEMA_VERSION, ResponseEnvelope, ResponseError,
    ResponseMeta,
};
