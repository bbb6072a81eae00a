pub mod blog_api;
pub mod llm;
pub mod policy;
