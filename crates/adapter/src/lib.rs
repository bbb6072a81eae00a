mod common;
mod drivers;
mod traits;

pub use drivers::blog_api::{BlogApiClient, BlogApiConfig};
pub use drivers::llm::{ChatCompletionsGenerator, LlmConfig};
pub use drivers::policy::{ConfigLayers, ConfigPolicyProvider, StaticPolicyProvider};
pub use traits::{CommentSource, PolicyProvider, RemotePublisher, Switches, TextGenerator};
