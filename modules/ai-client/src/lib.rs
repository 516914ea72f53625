pub mod openai;
pub mod passthrough;
pub mod traits;

pub use openai::OpenAi;
pub use passthrough::Passthrough;
pub use traits::ConversationAi;
