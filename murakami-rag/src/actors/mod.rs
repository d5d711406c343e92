pub mod generation;
pub mod pdf_actor;
pub mod rag;
pub mod rag_actor;
pub mod user_actor;

pub use pdf_actor::PdfActor;
pub use rag_actor::{AnswerPipeline, RagActor};
pub use user_actor::{UserActor, UserAgentHandle};
