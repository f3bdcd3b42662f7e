//! LLM 层：客户端抽象（神谕）、同步句柄 Brain 与 Mock 实现

pub mod brain;
pub mod mock;
pub mod traits;

pub use brain::Brain;
pub use mock::MockLlmClient;
pub use traits::{CompletionStream, LlmClient, LlmError};
