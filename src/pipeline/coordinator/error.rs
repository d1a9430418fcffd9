use thiserror::Error;
use uuid::Uuid;

use crate::models::DocumentStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error("Work queue is full")]
    QueueFull,

    #[error("Pipeline is stopped")]
    Stopped,

    #[error("Document {id} is {status}, only queued documents can be submitted")]
    NotQueued { id: Uuid, status: DocumentStatus },
}
