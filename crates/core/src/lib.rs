pub mod catalog;
pub mod challenge;
pub mod conversation;
pub mod error;
pub mod evaluation;
pub mod llm_client;
pub mod prompts;
pub mod retry;
pub mod tutor;
pub mod understanding;

pub use error::TutorError;
