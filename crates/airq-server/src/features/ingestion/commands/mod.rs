pub mod submit;

pub use submit::{SubmitIngestionCommand, SubmitIngestionError, SubmitIngestionResponse};
