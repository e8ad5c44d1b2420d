pub mod mistral;

pub use mistral::{MistralChat, MistralEmbeddings};
