// Event types for async communication

use crate::api::{InvokeError, InvokeResponse};

#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The model invocation for submission `id` resolved or rejected
    GenerationSettled {
        id: u64,
        result: Result<InvokeResponse, InvokeError>,
    },
}
